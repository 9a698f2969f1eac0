use clap::Parser;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, EntityTrait, QueryFilter, QueryOrder, Set,
};

use sanjeri_api::{
    config::AppConfig,
    db::{create_orm_conn, create_pool},
    domain::slug,
    entity::products::{ActiveModel as ProductActive, Column as ProductCol, Entity as Products},
    services::admin_catalog_service::unique_product_slug,
};

/// Fill in missing product slugs, or rebuild every slug from the product name.
#[derive(Parser)]
#[command(name = "generate_slugs")]
struct Cli {
    /// Regenerate slugs for all products, including ones that already have a slug
    #[arg(long)]
    all: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    let config = AppConfig::from_env()?;
    let pool = create_pool(&config.database_url).await?;
    let orm = create_orm_conn(&pool);

    let mut finder = Products::find().order_by_asc(ProductCol::CreatedAt);
    if cli.all {
        println!("Regenerating slugs for ALL products...");
    } else {
        println!("Generating slugs only for products without slugs...");
        finder = finder.filter(
            Condition::any()
                .add(ProductCol::Slug.is_null())
                .add(ProductCol::Slug.eq("")),
        );
    }

    let mut count = 0;
    for product in finder.all(&orm).await? {
        let base = slug::slugify(&product.name);
        if base.is_empty() {
            println!("Skipped \"{}\": name has no sluggable characters", product.name);
            continue;
        }
        let next = unique_product_slug(&orm, &base, Some(product.id)).await?;
        let old = product.slug.clone().filter(|s| !s.is_empty());
        if old.as_deref() == Some(next.as_str()) {
            continue;
        }

        let name = product.name.clone();
        let mut active: ProductActive = product.into();
        active.slug = Set(Some(next.clone()));
        active.update(&orm).await?;
        count += 1;

        match old {
            Some(old) => println!("Updated slug: \"{old}\" -> \"{next}\" for \"{name}\""),
            None => println!("Generated slug: \"{next}\" for \"{name}\""),
        }
    }

    println!("Successfully processed {count} products!");
    Ok(())
}
