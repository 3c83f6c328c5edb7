use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub type Guid = String;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EntityStatus {
    Active,
    Deleted,
}

impl Default for EntityStatus {
    fn default() -> Self {
        EntityStatus::Active
    }
}

impl std::fmt::Display for EntityStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            EntityStatus::Active => write!(f, "ACTIVE"),
            EntityStatus::Deleted => write!(f, "DELETED"),
        }
    }
}

/// Known asset families. Serialized with the catalog's type names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum AssetType {
    Connection,
    Database,
    Schema,
    Table,
    Column,
    #[serde(rename = "AtlasGlossary")]
    Glossary,
    #[serde(rename = "AtlasGlossaryTerm")]
    GlossaryTerm,
    #[serde(rename = "AtlasGlossaryCategory")]
    GlossaryCategory,
    KafkaTopic,
    KafkaConsumerGroup,
    S3Bucket,
    S3Object,
    Dashboard,
    Process,
}

impl AssetType {
    pub fn type_name(&self) -> &'static str {
        match self {
            AssetType::Connection => "Connection",
            AssetType::Database => "Database",
            AssetType::Schema => "Schema",
            AssetType::Table => "Table",
            AssetType::Column => "Column",
            AssetType::Glossary => "AtlasGlossary",
            AssetType::GlossaryTerm => "AtlasGlossaryTerm",
            AssetType::GlossaryCategory => "AtlasGlossaryCategory",
            AssetType::KafkaTopic => "KafkaTopic",
            AssetType::KafkaConsumerGroup => "KafkaConsumerGroup",
            AssetType::S3Bucket => "S3Bucket",
            AssetType::S3Object => "S3Object",
            AssetType::Dashboard => "Dashboard",
            AssetType::Process => "Process",
        }
    }

    /// Glossary-family qualified names are assigned by the catalog, not derived client-side.
    pub fn has_assigned_qualified_name(&self) -> bool {
        matches!(
            self,
            AssetType::Glossary | AssetType::GlossaryTerm | AssetType::GlossaryCategory
        )
    }
}

impl std::fmt::Display for AssetType {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{}", self.type_name())
    }
}

impl std::str::FromStr for AssetType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Connection" => Ok(AssetType::Connection),
            "Database" => Ok(AssetType::Database),
            "Schema" => Ok(AssetType::Schema),
            "Table" => Ok(AssetType::Table),
            "Column" => Ok(AssetType::Column),
            "AtlasGlossary" => Ok(AssetType::Glossary),
            "AtlasGlossaryTerm" => Ok(AssetType::GlossaryTerm),
            "AtlasGlossaryCategory" => Ok(AssetType::GlossaryCategory),
            "KafkaTopic" => Ok(AssetType::KafkaTopic),
            "KafkaConsumerGroup" => Ok(AssetType::KafkaConsumerGroup),
            "S3Bucket" => Ok(AssetType::S3Bucket),
            "S3Object" => Ok(AssetType::S3Object),
            "Dashboard" => Ok(AssetType::Dashboard),
            "Process" => Ok(AssetType::Process),
            _ => Err(format!("Unknown asset type: {}", s)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectorType {
    Snowflake,
    Postgres,
    Kafka,
    S3,
    Tableau,
}

impl std::fmt::Display for ConnectorType {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        let value = match self {
            ConnectorType::Snowflake => "snowflake",
            ConnectorType::Postgres => "postgres",
            ConnectorType::Kafka => "kafka",
            ConnectorType::S3 => "s3",
            ConnectorType::Tableau => "tableau",
        };
        write!(f, "{}", value)
    }
}

pub fn generate_guid() -> Guid {
    Uuid::new_v4().to_string()
}

/// Short random identifier used for catalog-assigned qualified names.
pub fn generate_short_id() -> String {
    Uuid::new_v4().simple().to_string()[..21].to_string()
}

/// Child qualified names are always `parent/name`.
pub fn child_qualified_name(parent_qualified_name: &str, name: &str) -> String {
    format!("{}/{}", parent_qualified_name, name)
}

/// Connection qualified names are rooted at the tenant default and the connector.
pub fn connection_qualified_name(connector: ConnectorType) -> String {
    format!(
        "default/{}/{}{}",
        connector,
        chrono::Utc::now().timestamp(),
        &Uuid::new_v4().simple().to_string()[..6]
    )
}

/// Connector portion of any qualified name rooted at a connection.
pub fn connector_of(qualified_name: &str) -> Option<ConnectorType> {
    let mut parts = qualified_name.split('/');
    if parts.next() != Some("default") {
        return None;
    }
    match parts.next()? {
        "snowflake" => Some(ConnectorType::Snowflake),
        "postgres" => Some(ConnectorType::Postgres),
        "kafka" => Some(ConnectorType::Kafka),
        "s3" => Some(ConnectorType::S3),
        "tableau" => Some(ConnectorType::Tableau),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_asset_type_round_trips_through_type_name() {
        for asset_type in [
            AssetType::Connection,
            AssetType::Glossary,
            AssetType::GlossaryCategory,
            AssetType::KafkaConsumerGroup,
            AssetType::Process,
        ] {
            let parsed: AssetType = asset_type.type_name().parse().unwrap();
            assert_eq!(parsed, asset_type);
        }
        assert!("Nope".parse::<AssetType>().is_err());
        assert_eq!(
            serde_json::to_string(&AssetType::GlossaryTerm).unwrap(),
            "\"AtlasGlossaryTerm\""
        );
    }

    #[test]
    fn test_connection_qualified_name_carries_connector() {
        let qn = connection_qualified_name(ConnectorType::Kafka);
        assert!(qn.starts_with("default/kafka/"));
        assert_eq!(connector_of(&qn), Some(ConnectorType::Kafka));
        assert_eq!(
            connector_of(&child_qualified_name(&qn, "orders")),
            Some(ConnectorType::Kafka)
        );
        assert_eq!(connector_of("abc@def"), None);
    }
}
