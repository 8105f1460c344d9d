#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Env {
    Development,
    Production,
    Testing,
}

pub struct ServerConfig {
    pub env: Env,
    pub database_url: String,
    pub secret_key: String,
    pub admin_password: String,
    pub port: u16,
}

fn var(key: &str) -> Result<Option<String>, String> {
    match std::env::var(key) {
        Ok(env) => Ok(Some(env)),
        Err(e) => match e {
            std::env::VarError::NotPresent => Ok(None),
            std::env::VarError::NotUnicode(_) => Err(format!(
                "Could not get the environment variable `{key}` due to unicode error"
            )),
        },
    }
}

fn required_var(key: &str) -> String {
    let val = var(key);
    match val {
        Ok(val) => match val {
            Some(val) => val,
            None => {
                tracing::error!("Environment variable `{key}` is required");
                std::process::exit(1)
            }
        },
        Err(e) => {
            tracing::error!(
                "Environment variable `{key}` is required, but could not retrieve: {e}"
            );
            std::process::exit(1)
        }
    }
}

fn var_or_default(key: &str, default: &str) -> String {
    match var(key) {
        Ok(Some(val)) => val,
        _ => {
            tracing::warn!("Environment variable `{key}` is not set, using the default");
            default.to_owned()
        }
    }
}

pub fn parse_env(value: &str) -> Env {
    match value {
        "development" => Env::Development,
        "production" => Env::Production,
        "testing" => Env::Testing,
        _ => Env::Development,
    }
}

impl ServerConfig {
    pub fn new_from_env() -> Self {
        let env = match var("ENVIRONMENT") {
            Ok(Some(env)) => parse_env(&env),
            _ => Env::Development,
        };

        // The database URL has no sensible fallback in production, while a
        // local default keeps the development loop short.
        let database_url = match env {
            Env::Production => required_var("DATABASE_URL"),
            _ => var_or_default("DATABASE_URL", "postgres://localhost/blog"),
        };

        ServerConfig {
            env,
            database_url,
            secret_key: var_or_default("SECRET_KEY", "dev-secret-change-me-in-production"),
            admin_password: var_or_default("ADMIN_PASSWORD", "changeme"),
            port: match var("PORT") {
                Ok(Some(port)) => port.parse().unwrap_or_else(|_| {
                    tracing::warn!("Could not parse PORT `{port}`, using 5000");
                    5000
                }),
                _ => 5000,
            },
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_parse_env_known_names() {
        assert_eq!(parse_env("development"), Env::Development);
        assert_eq!(parse_env("production"), Env::Production);
        assert_eq!(parse_env("testing"), Env::Testing);
    }

    #[test]
    fn test_parse_env_falls_back_to_development() {
        assert_eq!(
            parse_env("staging"),
            Env::Development,
            "unknown environment names should fall back to development"
        );
    }
}
