use clap::Parser;
use rust_decimal::Decimal;
use uuid::Uuid;

use sanjeri_api::{
    config::AppConfig,
    db::{create_orm_conn, create_pool, run_migrations},
    domain::slug,
    services::auth_service::hash_password,
};

/// Seed an admin, a customer and a small demo catalog.
#[derive(Parser)]
#[command(name = "seed")]
struct Cli {
    #[arg(long, default_value = "admin@sanjeri.local")]
    admin_email: String,
    #[arg(long, default_value = "Admin@123")]
    admin_password: String,
    #[arg(long, default_value = "user@sanjeri.local")]
    user_email: String,
    #[arg(long, default_value = "User@1234")]
    user_password: String,
}

struct SeedVariant {
    volume_ml: i32,
    gender: &'static str,
    price: i64,
    discount_price: Option<i64>,
    stock: i32,
}

const fn variant(
    volume_ml: i32,
    gender: &'static str,
    price: i64,
    discount_price: Option<i64>,
    stock: i32,
) -> SeedVariant {
    SeedVariant {
        volume_ml,
        gender,
        price,
        discount_price,
        stock,
    }
}

struct SeedProduct {
    category: &'static str,
    name: &'static str,
    sku: &'static str,
    brand: &'static str,
    fragrance_type: &'static str,
    occasion: &'static str,
    description: &'static str,
    featured: bool,
    best_selling: bool,
    new_arrival: bool,
    variants: &'static [SeedVariant],
}

const CATEGORIES: &[(&str, &str, bool)] = &[
    ("Eau de Parfum", "Long-lasting concentrated fragrances", true),
    ("Eau de Toilette", "Light everyday scents", true),
    ("Attar", "Alcohol-free traditional oils", false),
];

const PRODUCTS: &[SeedProduct] = &[
    SeedProduct {
        category: "Eau de Parfum",
        name: "Midnight Oud",
        sku: "SJ-OUD",
        brand: "Sanjeri",
        fragrance_type: "woody",
        occasion: "evening",
        description: "Smoky oud over amber and leather.",
        featured: true,
        best_selling: true,
        new_arrival: false,
        variants: &[
            variant(50, "Male", 2499, Some(1999), 40),
            variant(100, "Male", 3999, None, 8),
        ],
    },
    SeedProduct {
        category: "Eau de Parfum",
        name: "Rose Reverie",
        sku: "SJ-ROSE",
        brand: "Sanjeri",
        fragrance_type: "floral",
        occasion: "party",
        description: "Damask rose with pink pepper and musk.",
        featured: true,
        best_selling: false,
        new_arrival: true,
        variants: &[
            variant(30, "Female", 1499, None, 25),
            variant(100, "Female", 3499, Some(2999), 0),
        ],
    },
    SeedProduct {
        category: "Eau de Toilette",
        name: "Citrus Breeze",
        sku: "SJ-CIT",
        brand: "Sanjeri",
        fragrance_type: "citrus",
        occasion: "daily",
        description: "Bergamot, lime and vetiver for warm days.",
        featured: false,
        best_selling: true,
        new_arrival: true,
        variants: &[
            variant(50, "Unisex", 999, Some(799), 60),
            variant(100, "Unisex", 1699, None, 30),
        ],
    },
    SeedProduct {
        category: "Attar",
        name: "Sandal Mist",
        sku: "SJ-SAN",
        brand: "Sanjeri",
        fragrance_type: "woody",
        occasion: "festive",
        description: "Mysore sandalwood oil, alcohol free.",
        featured: false,
        best_selling: false,
        new_arrival: false,
        variants: &[
            variant(10, "Unisex", 799, None, 5),
        ],
    },
];

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    let config = AppConfig::from_env()?;

    let pool = create_pool(&config.database_url).await?;
    run_migrations(&create_orm_conn(&pool)).await?;

    let admin_id =
        ensure_user(&pool, "admin", &cli.admin_email, &cli.admin_password, "admin").await?;
    let user_id =
        ensure_user(&pool, "customer", &cli.user_email, &cli.user_password, "user").await?;
    seed_catalog(&pool).await?;

    println!("Seed completed. Admin ID: {admin_id}, User ID: {user_id}");
    Ok(())
}

async fn ensure_user(
    pool: &sqlx::PgPool,
    username: &str,
    email: &str,
    password: &str,
    role: &str,
) -> anyhow::Result<Uuid> {
    let password_hash = hash_password(password)?;

    let (user_id,): (Uuid,) = sqlx::query_as(
        r#"
        INSERT INTO users (id, username, email, password_hash, role)
        VALUES ($1, $2, $3, $4, $5)
        ON CONFLICT (email) WHERE is_deleted = FALSE
            DO UPDATE SET role = EXCLUDED.role, password_hash = EXCLUDED.password_hash
        RETURNING id
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(username)
    .bind(email)
    .bind(password_hash)
    .bind(role)
    .fetch_one(pool)
    .await?;

    println!("Ensured user {email} (role={role})");
    Ok(user_id)
}

async fn ensure_category(
    pool: &sqlx::PgPool,
    name: &str,
    description: &str,
    featured: bool,
    sort_order: i32,
) -> anyhow::Result<Uuid> {
    let existing: Option<(Uuid,)> =
        sqlx::query_as("SELECT id FROM categories WHERE name = $1 AND is_deleted = FALSE")
            .bind(name)
            .fetch_optional(pool)
            .await?;
    if let Some((id,)) = existing {
        return Ok(id);
    }

    let id = Uuid::new_v4();
    sqlx::query(
        r#"
        INSERT INTO categories (id, name, slug, description, is_featured, sort_order)
        VALUES ($1, $2, $3, $4, $5, $6)
        "#,
    )
    .bind(id)
    .bind(name)
    .bind(slug::slugify(name))
    .bind(description)
    .bind(featured)
    .bind(sort_order)
    .execute(pool)
    .await?;
    Ok(id)
}

async fn seed_catalog(pool: &sqlx::PgPool) -> anyhow::Result<()> {
    let mut category_ids = Vec::with_capacity(CATEGORIES.len());
    for (position, (name, description, featured)) in CATEGORIES.iter().enumerate() {
        let id = ensure_category(pool, name, description, *featured, position as i32).await?;
        category_ids.push((*name, id));
    }

    for product in PRODUCTS {
        let Some((_, category_id)) = category_ids.iter().find(|(n, _)| *n == product.category)
        else {
            continue;
        };
        let product_slug = slug::slugify(product.name);
        let inserted: Option<(Uuid,)> = sqlx::query_as(
            r#"
            INSERT INTO products (
                id, category_id, name, slug, sku, description, brand, fragrance_type, occasion,
                is_featured, is_best_selling, is_new_arrival
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            ON CONFLICT (slug) WHERE is_deleted = FALSE DO NOTHING
            RETURNING id
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(category_id)
        .bind(product.name)
        .bind(&product_slug)
        .bind(product.sku)
        .bind(product.description)
        .bind(product.brand)
        .bind(product.fragrance_type)
        .bind(product.occasion)
        .bind(product.featured)
        .bind(product.best_selling)
        .bind(product.new_arrival)
        .fetch_optional(pool)
        .await?;

        let Some((product_id,)) = inserted else {
            println!("Product {} already present", product.name);
            continue;
        };

        for variant in product.variants {
            sqlx::query(
                r#"
                INSERT INTO product_variants (
                    id, product_id, volume_ml, gender, sku, price, discount_price, stock
                )
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
                ON CONFLICT (sku) DO NOTHING
                "#,
            )
            .bind(Uuid::new_v4())
            .bind(product_id)
            .bind(variant.volume_ml)
            .bind(variant.gender)
            .bind(slug::variant_sku_base(product.sku, variant.volume_ml, variant.gender))
            .bind(Decimal::from(variant.price))
            .bind(variant.discount_price.map(Decimal::from))
            .bind(variant.stock)
            .execute(pool)
            .await?;
        }

        sqlx::query(
            r#"
            INSERT INTO product_images (id, product_id, image_url, alt_text, is_default)
            VALUES ($1, $2, $3, $4, TRUE)
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(product_id)
        .bind(format!("/media/products/{product_slug}.jpg"))
        .bind(product.name)
        .execute(pool)
        .await?;

        println!("Seeded product {}", product.name);
    }

    Ok(())
}
