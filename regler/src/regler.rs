use std::mem;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use regler_core::SettingStore;
use regler_core::attachments::AttachmentStore;
use regler_core::attachments::DisabledAttachments;
use regler_core::fields::FieldRegistry;
use regler_core::fields::FieldType;
use rorm::Database;
use rorm::DatabaseConfiguration;
use rorm::DatabaseDriver;
use serde::Deserialize;
use tokio::net::TcpListener;
use tracing::Level;
use tracing::info;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use crate::error::ReglerError;
use crate::handler;
use crate::logging::FlatJson;

#[non_exhaustive]
pub struct Regler;

impl Regler {
    pub fn new() -> ReglerBuilder {
        ReglerBuilder::new()
    }
}

/// First builder phase: field types and collaborators.
pub struct ReglerBuilder {
    fields: Vec<FieldType>,
    attachments: Arc<dyn AttachmentStore>,
}

impl ReglerBuilder {
    fn new() -> ReglerBuilder {
        let registry = tracing_subscriber::registry()
            .with(EnvFilter::try_from_default_env().unwrap_or(EnvFilter::new(Level::INFO.as_str())));

        if std::env::var_os("REGLER_LOG_JSON").is_some() {
            registry
                .with(tracing_subscriber::fmt::layer().event_format(FlatJson {
                    service_name: "regler".to_string(),
                }))
                .init();
        } else {
            registry.with(tracing_subscriber::fmt::layer()).init();
        }

        ReglerBuilder {
            fields: Vec::new(),
            attachments: Arc::new(DisabledAttachments),
        }
    }

    /// Registers a field type on top of the builtin catalog.
    pub fn register_field_type(&mut self, field: FieldType) -> &mut Self {
        self.fields.push(field);
        self
    }

    /// Sets the attachment collaborator file-type settings resolve through.
    pub fn attachments(&mut self, attachments: Arc<dyn AttachmentStore>) -> &mut Self {
        self.attachments = attachments;
        self
    }

    /// Connects the database and finishes the catalog.
    ///
    /// Connection parameters are read from the environment
    /// (`REGLER_DB_HOST`, `REGLER_DB_PORT`, `REGLER_DB_NAME`,
    /// `REGLER_DB_USER`, `REGLER_DB_PASSWORD`).
    pub async fn connect_database(&mut self) -> Result<RouterBuilder, ReglerError> {
        let config: DbConfig = envy::prefixed("REGLER_").from_env()?;

        let db = Database::connect(DatabaseConfiguration::new(DatabaseDriver::Postgres {
            name: config.db_name,
            host: config.db_host,
            port: config.db_port,
            user: config.db_user,
            password: config.db_password,
        }))
        .await?;

        let mut registry = FieldRegistry::builtins_builder();
        for field in mem::take(&mut self.fields) {
            registry = registry.register(field)?;
        }

        let store = Arc::new(SettingStore::new(
            db,
            registry.build()?,
            self.attachments.clone(),
        ));

        Ok(RouterBuilder {
            store,
            routes: Router::new(),
        })
    }
}

/// Second builder phase: routes and serving.
pub struct RouterBuilder {
    store: Arc<SettingStore>,
    routes: Router,
}

impl RouterBuilder {
    /// The settings registry service, for application-side lookups.
    pub fn store(&self) -> Arc<SettingStore> {
        self.store.clone()
    }

    /// Adds a router to the builder
    pub fn add_routes(&mut self, router: Router) -> &mut Self {
        let this = mem::replace(&mut self.routes, Router::new());
        self.routes = this.merge(router);
        self
    }

    /// Starts the webserver
    pub async fn start(&mut self, socket_addr: SocketAddr) -> Result<(), ReglerError> {
        let routes = mem::replace(&mut self.routes, Router::new());
        let router = routes.merge(handler::router(self.store.clone()));

        let socket = TcpListener::bind(socket_addr).await?;

        info!("Starting to serve the settings panel on http://{socket_addr}");
        axum::serve(socket, router).await?;

        Ok(())
    }
}

#[derive(Debug, Deserialize)]
struct DbConfig {
    db_host: String,

    #[serde(default = "default_db_port")]
    db_port: u16,

    db_name: String,
    db_user: String,
    db_password: String,
}

fn default_db_port() -> u16 {
    5432
}
