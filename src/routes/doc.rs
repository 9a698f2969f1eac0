use utoipa::{
    Modify, OpenApi,
    openapi::{
        self,
        OpenApi as OpenApiSpec,
        security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    },
};
use utoipa_scalar::{Scalar, Servable};

use crate::{
    domain::{
        order_rules::{OrderStatus, PaymentMethod, PaymentStatus},
        pricing::PriceBreakdown,
    },
    dto::cart::CartAction,
    models::{Address, Category, Order, OrderItem, Product, ProductImage, User, Variant},
    response::Meta,
    routes::{
        addresses, admin, admin_catalog, auth, cart, catalog, health, orders, params, payments,
        profile, wishlist,
    },
};

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer_auth",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
    }
}

#[derive(OpenApi)]
#[openapi(
    info(title = "Sanjeri API", description = "Perfume storefront and back-office"),
    paths(
        health::health_check,
        auth::signup,
        auth::signup_verify,
        auth::signup_resend,
        auth::login,
        auth::forgot_password,
        auth::reset_password,
        profile::get_profile,
        profile::update_profile,
        profile::change_email,
        profile::verify_email_change,
        profile::change_password,
        profile::verify_password_change,
        addresses::list_addresses,
        addresses::get_address,
        addresses::create_address,
        addresses::update_address,
        addresses::delete_address,
        addresses::set_default_address,
        catalog::home,
        catalog::list_categories,
        catalog::list_products,
        catalog::product_detail,
        cart::view_cart,
        cart::add_to_cart,
        cart::update_item,
        cart::remove_item,
        cart::clear_cart,
        cart::cart_count,
        cart::variant_in_cart,
        wishlist::view_wishlist,
        wishlist::add_to_wishlist,
        wishlist::remove_from_wishlist,
        orders::checkout_summary,
        orders::place_order,
        orders::list_orders,
        orders::order_detail,
        orders::cancel_order,
        orders::cancel_order_item,
        orders::return_order,
        orders::download_invoice,
        payments::initiate_payment,
        payments::retry_payment,
        payments::verify_payment,
        admin::dashboard,
        admin::list_users,
        admin::user_detail,
        admin::toggle_user_status,
        admin::delete_user,
        admin::list_orders,
        admin::order_detail,
        admin::update_order_status,
        admin::inventory,
        admin::set_stock,
        admin::adjust_stock,
        admin_catalog::list_categories,
        admin_catalog::create_category,
        admin_catalog::update_category,
        admin_catalog::delete_category,
        admin_catalog::restore_category,
        admin_catalog::list_products,
        admin_catalog::trash,
        admin_catalog::create_product,
        admin_catalog::get_product,
        admin_catalog::update_product,
        admin_catalog::delete_product,
        admin_catalog::restore_product,
        admin_catalog::permanent_delete_product,
        admin_catalog::add_variant,
        admin_catalog::update_variant,
        admin_catalog::delete_variant,
        admin_catalog::restore_variant,
        admin_catalog::add_image,
        admin_catalog::delete_image,
        admin_catalog::set_default_image
    ),
    components(
        schemas(
            User,
            Address,
            Category,
            Product,
            Variant,
            ProductImage,
            Order,
            OrderItem,
            OrderStatus,
            PaymentStatus,
            PaymentMethod,
            PriceBreakdown,
            CartAction,
            params::Pagination,
            Meta
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Health", description = "Health check endpoint"),
        (name = "Auth", description = "Signup with email OTP, login, password reset"),
        (name = "Profile", description = "Profile, email and password changes"),
        (name = "Addresses", description = "Saved delivery addresses"),
        (name = "Catalog", description = "Storefront browsing"),
        (name = "Cart", description = "Cart endpoints"),
        (name = "Wishlist", description = "Wishlist endpoints"),
        (name = "Checkout", description = "Checkout summary and order placement"),
        (name = "Orders", description = "Order history, cancellation, returns, invoices"),
        (name = "Payments", description = "Online payment through the gateway"),
        (name = "Admin", description = "Dashboard, users, orders and inventory"),
        (name = "Admin Catalog", description = "Category, product, variant and image management"),
    )
)]
pub struct ApiDoc;

pub fn scalar_docs() -> Scalar<OpenApiSpec> {
    Scalar::with_url("/docs", ApiDoc::openapi())
}
