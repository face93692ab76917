use std::sync::Arc;

use askama::Template;
use axum::{
    extract::State,
    response::{IntoResponse, Response},
};

use crate::{
    error::AuthResult,
    models::{AccountSummary, BindingRecord, Statistics},
    routes::render,
    session::SessionUser,
    state::AppState,
};

#[derive(Template)]
#[template(path = "admin.html")]
struct AdminTemplate {
    current_user: String,
    accounts: Vec<AccountRow>,
    bindings: Vec<BindingRow>,
    stats: Statistics,
}

struct AccountRow {
    username: String,
    description: String,
    created_at: String,
    last_login: String,
    login_count: u64,
    is_active: bool,
    is_bound: bool,
    is_self: bool,
}

struct BindingRow {
    username: String,
    bound_at: String,
    last_used: String,
}

const NEVER: &str = "never";

async fn load(
    st: &AppState,
) -> AuthResult<(Vec<AccountSummary>, Vec<BindingRecord>, Statistics)> {
    Ok((
        st.store.list_accounts().await?,
        st.store.binding_records().await?,
        st.store.statistics().await?,
    ))
}
const STAMP: &str = "%Y-%m-%d %H:%M";

pub async fn admin_page(State(st): State<Arc<AppState>>, user: SessionUser) -> Response {
    let (accounts, bindings, stats) = match load(&st).await {
        Ok(loaded) => loaded,
        Err(err) => return err.into_response(),
    };

    let accounts = accounts
        .into_iter()
        .map(|a| AccountRow {
            is_self: a.username == user.username(),
            created_at: a.created_at.format(STAMP).to_string(),
            last_login: a
                .last_login_at
                .map(|t| t.format(STAMP).to_string())
                .unwrap_or_else(|| NEVER.to_string()),
            login_count: a.login_count,
            is_active: a.is_active,
            is_bound: a.is_bound,
            description: a.description,
            username: a.username,
        })
        .collect();

    let bindings = bindings
        .into_iter()
        .map(|b| BindingRow {
            bound_at: b.bound_at.format(STAMP).to_string(),
            last_used: b
                .last_used_at
                .map(|t| t.format(STAMP).to_string())
                .unwrap_or_else(|| NEVER.to_string()),
            username: b.username,
        })
        .collect();

    render(AdminTemplate {
        current_user: user.username().to_string(),
        accounts,
        bindings,
        stats,
    })
    .into_response()
}
