use crate::lib::engine::types::{ImageRef, PortBinding};

use super::types::{ProvisioningSpec, Recipe};

pub const MYSQL_SERVICE: &str = "MySqlServer";
pub const DYNAMODB_SERVICE: &str = "DynamoDb";

/// Local MySQL server on 127.0.0.1:8080, rebuilt from a fresh image on every request.
pub fn mysql() -> ProvisioningSpec {
    ProvisioningSpec {
        service_name: MYSQL_SERVICE.to_string(),
        image: ImageRef::new("mysql/mysql-server", "latest"),
        hostname: Some("localhost".to_string()),
        port_bindings: vec![PortBinding {
            container_port: "80/tcp".to_string(),
            host_ip: Some("127.0.0.1".to_string()),
            host_port: "8080".to_string(),
        }],
        env: vec![
            "MYSQL_USER=root".to_string(),
            "MYSQL_ROOT_PASSWORD=password".to_string(),
        ],
        publish_all_ports: false,
        remove_if_exists: true,
        recipe: Recipe::Recreate,
    }
}

/// DynamoDB Local on port 8000, created once and restarted on demand.
pub fn dynamodb() -> ProvisioningSpec {
    ProvisioningSpec {
        service_name: DYNAMODB_SERVICE.to_string(),
        image: ImageRef::new("amazon/dynamodb-local", "latest"),
        hostname: None,
        port_bindings: vec![PortBinding {
            container_port: "8000/tcp".to_string(),
            host_ip: None,
            host_port: "8000".to_string(),
        }],
        env: Vec::new(),
        publish_all_ports: true,
        remove_if_exists: false,
        recipe: Recipe::EnsureRunning,
    }
}

pub fn all() -> Vec<ProvisioningSpec> {
    vec![mysql(), dynamodb()]
}

pub fn lookup(service_name: &str) -> Option<ProvisioningSpec> {
    all()
        .into_iter()
        .find(|spec| spec.service_name.eq_ignore_ascii_case(service_name))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mysql_request_uses_tagged_name_and_credentials() {
        let request = mysql().create_request("MySqlServer_dockerservice");
        assert_eq!(request.name, "MySqlServer_dockerservice");
        assert_eq!(request.image, "mysql/mysql-server:latest");
        assert!(request.env.contains(&"MYSQL_ROOT_PASSWORD=password".to_string()));
        assert_eq!(request.hostname.as_deref(), Some("localhost"));
    }

    #[test]
    fn lookup_is_case_insensitive() {
        assert_eq!(lookup("dynamodb").map(|s| s.recipe), Some(Recipe::EnsureRunning));
        assert!(lookup("postgres").is_none());
    }
}
