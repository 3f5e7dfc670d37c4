use std::net::SocketAddr;
use std::str::FromStr;
use std::sync::Arc;

use regler::Regler;
use regler::core::SettingStore;
use regler::core::fields::FieldType;
use regler::core::fields::ParamShape;
use regler::core::store::SettingLookup;
use regler::re_exports::axum::Router;
use regler::re_exports::axum::extract::State;
use regler::re_exports::axum::routing::get;
use tracing::info;

/// Reads the `site_title` setting the way application code would.
async fn site_title(State(store): State<Arc<SettingStore>>) -> String {
    match store
        .value_or(
            "site_title",
            SettingLookup::Scalar("regler demo".to_string()),
        )
        .await
    {
        SettingLookup::Scalar(title) => title,
        other => format!("{other:?}"),
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let mut regler = Regler::new()
        .register_field_type(FieldType::new("color", "Color").param("format", ParamShape::Text))
        .connect_database()
        .await?;

    let store = regler.store();
    info!("Settings panel ready, try creating a 'site_title' setting");

    regler
        .add_routes(
            Router::new()
                .route("/site-title", get(site_title))
                .with_state(store),
        )
        .start(SocketAddr::from_str("127.0.0.1:8080")?)
        .await?;

    Ok(())
}
