// routes/mod.rs
// Public re-exports of all route handlers.

use askama::Template;
use axum::{http::StatusCode, response::Html};

pub mod admin;
pub mod dashboard;
pub mod home;
pub mod login;
pub mod logout;
pub mod qrcode;
pub mod setup;

pub use admin::{
    admin_page, bind_self, bindings_index, clear_data, create_account, deactivate_account,
    export_data, list_accounts, reactivate_account, statistics, unbind_account,
};
pub use dashboard::{dashboard, session_status};
pub use home::home;
pub use login::{login, login_totp};
pub use logout::logout;
pub use qrcode::qrcode;
pub use setup::{first_account, setup, setup_complete, setup_reset, setup_verify};

pub(crate) fn render<T: Template>(tpl: T) -> Result<Html<String>, StatusCode> {
    tpl.render()
        .map(Html)
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)
}
