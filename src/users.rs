use serde::Deserialize;

use std::collections::BTreeMap;
use std::path::Path;

/// A site account. Subscriber identity on the remote service is the
/// account's email address; first/last name travel along as merge
/// attributes when subscribing.
#[derive(Debug, Clone, Deserialize)]
pub struct User {
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    pub password_hash: String,
    #[serde(default)]
    pub admin: bool,
}

#[derive(Debug, Clone, Default)]
pub struct UserRegistry {
    users: BTreeMap<String, User>,
}

#[derive(Debug)]
pub enum RegistryError {
    Io(std::io::Error),
    Parse(toml::de::Error),
    DuplicateUser(String),
}

impl std::fmt::Display for RegistryError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RegistryError::Io(err) => write!(f, "failed to read user registry: {err}"),
            RegistryError::Parse(err) => write!(f, "failed to parse user registry: {err}"),
            RegistryError::DuplicateUser(name) => write!(f, "duplicate user '{name}'"),
        }
    }
}

#[derive(Debug, Deserialize)]
struct RegistryFile {
    #[serde(default)]
    users: Vec<User>,
}

impl UserRegistry {
    pub fn load(path: &Path) -> Result<Self, RegistryError> {
        let contents = std::fs::read_to_string(path).map_err(RegistryError::Io)?;
        let file: RegistryFile = toml::from_str(&contents).map_err(RegistryError::Parse)?;
        Self::from_users(file.users)
    }

    pub fn from_users(users: Vec<User>) -> Result<Self, RegistryError> {
        let mut registry = BTreeMap::new();
        for user in users {
            let name = user.name.clone();
            if registry.insert(name.clone(), user).is_some() {
                return Err(RegistryError::DuplicateUser(name));
            }
        }
        Ok(Self { users: registry })
    }

    pub fn get(&self, name: &str) -> Option<&User> {
        self.users.get(name)
    }

    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }
}

#[cfg(test)]
#[allow(non_snake_case)]
mod tests {
    use super::*;

    #[test]
    fn load__should_parse_users_from_toml() {
        // Given
        let path = write_registry(
            "parse",
            r#"
[[users]]
name = "alice"
email = "alice@example.com"
first_name = "Alice"
last_name = "Smith"
password_hash = "$argon2id$fake"
admin = true

[[users]]
name = "bob"
email = "bob@example.com"
password_hash = "$argon2id$fake"
"#,
        );

        // When
        let registry = UserRegistry::load(&path).expect("load registry");

        // Then
        let alice = registry.get("alice").expect("alice entry");
        assert_eq!(alice.email, "alice@example.com");
        assert_eq!(alice.first_name, "Alice");
        assert_eq!(alice.last_name, "Smith");
        assert!(alice.admin);

        let bob = registry.get("bob").expect("bob entry");
        assert_eq!(bob.first_name, "");
        assert_eq!(bob.last_name, "");
        assert!(!bob.admin);

        std::fs::remove_file(&path).expect("cleanup");
    }

    #[test]
    fn from_users__should_reject_duplicate_names() {
        // Given
        let users = vec![test_user("alice"), test_user("alice")];

        // When
        let result = UserRegistry::from_users(users);

        // Then
        assert!(matches!(result, Err(RegistryError::DuplicateUser(name)) if name == "alice"));
    }

    #[test]
    fn load__should_report_missing_file() {
        // When
        let result = UserRegistry::load(Path::new("/nonexistent/users.toml"));

        // Then
        assert!(matches!(result, Err(RegistryError::Io(_))));
    }

    fn test_user(name: &str) -> User {
        User {
            name: name.to_string(),
            email: format!("{name}@example.com"),
            first_name: String::new(),
            last_name: String::new(),
            password_hash: "hash".to_string(),
            admin: false,
        }
    }

    fn write_registry(test_name: &str, contents: &str) -> std::path::PathBuf {
        let nanos = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .expect("time")
            .as_nanos();
        let path = std::env::temp_dir().join(format!("listhub-users-{test_name}-{nanos}.toml"));
        std::fs::write(&path, contents).expect("write registry");
        path
    }
}
