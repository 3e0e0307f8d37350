//! Server configuration from command-line flags or `RIPPLE_*` environment
//! variables. Anything left unset falls back to the library defaults.

use std::net::SocketAddr;

use clap::{ArgAction, Parser};
use clap::builder::BoolishValueParser;
use ripple_auth::AuthConfig;
use ripple_db::DbConfig;

#[derive(Debug, Clone, Parser)]
#[command(name = "ripple-server")]
#[command(about = "Ripple referral platform server", long_about = None)]
pub struct ServerArgs {
    /// Listen address
    #[arg(long, env = "RIPPLE_BIND_ADDR", default_value = "0.0.0.0:8080")]
    pub bind_addr: SocketAddr,

    /// SurrealDB endpoint (`ws://host:port` or `mem://`)
    #[arg(long, env = "RIPPLE_DB_URL")]
    pub db_url: Option<String>,

    #[arg(long, env = "RIPPLE_DB_NAMESPACE")]
    pub db_namespace: Option<String>,

    #[arg(long, env = "RIPPLE_DB_DATABASE")]
    pub db_database: Option<String>,

    #[arg(long, env = "RIPPLE_DB_USER")]
    pub db_user: Option<String>,

    #[arg(long, env = "RIPPLE_DB_PASSWORD", hide_env_values = true)]
    pub db_password: Option<String>,

    /// Public base URL of the web application
    #[arg(long, env = "RIPPLE_APP_URL")]
    pub app_url: Option<String>,

    /// Base URL referral links are built on
    #[arg(long, env = "RIPPLE_REFERRAL_URL")]
    pub referral_url: Option<String>,

    /// Accept signed development session cookies
    #[arg(
        long,
        env = "RIPPLE_DEV_MODE",
        default_value = "false",
        action = ArgAction::Set,
        value_parser = BoolishValueParser::new()
    )]
    pub dev_mode: bool,

    #[arg(long, env = "RIPPLE_DEV_SESSION_SECRET", hide_env_values = true)]
    pub dev_session_secret: Option<String>,

    #[arg(long, env = "RIPPLE_SESSION_TTL_SECS")]
    pub session_ttl_secs: Option<u64>,

    #[arg(long, env = "RIPPLE_INVITE_TTL_SECS")]
    pub invite_ttl_secs: Option<u64>,

    #[arg(long, env = "RIPPLE_MAGIC_LINK_TTL_SECS")]
    pub magic_link_ttl_secs: Option<u64>,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub bind_addr: SocketAddr,
    pub db: DbConfig,
    pub auth: AuthConfig,
}

impl From<ServerArgs> for ServerConfig {
    fn from(args: ServerArgs) -> Self {
        let db_defaults = DbConfig::default();
        let auth_defaults = AuthConfig::default();

        Self {
            bind_addr: args.bind_addr,
            db: DbConfig {
                url: args.db_url.unwrap_or(db_defaults.url),
                namespace: args.db_namespace.unwrap_or(db_defaults.namespace),
                database: args.db_database.unwrap_or(db_defaults.database),
                username: args.db_user.unwrap_or(db_defaults.username),
                password: args.db_password.unwrap_or(db_defaults.password),
            },
            auth: AuthConfig {
                dev_mode: args.dev_mode,
                dev_session_secret: args
                    .dev_session_secret
                    .unwrap_or(auth_defaults.dev_session_secret),
                session_lifetime_secs: args
                    .session_ttl_secs
                    .unwrap_or(auth_defaults.session_lifetime_secs),
                invite_lifetime_secs: args
                    .invite_ttl_secs
                    .unwrap_or(auth_defaults.invite_lifetime_secs),
                magic_link_lifetime_secs: args
                    .magic_link_ttl_secs
                    .unwrap_or(auth_defaults.magic_link_lifetime_secs),
                app_base_url: args.app_url.unwrap_or(auth_defaults.app_base_url),
                referral_base_url: args
                    .referral_url
                    .unwrap_or(auth_defaults.referral_base_url),
            },
        }
    }
}
