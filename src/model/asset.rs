use crate::model::{
    child_qualified_name, connection_qualified_name, AssetType, ConnectorType, EntityStatus, Guid,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Default user for assets built client-side before the catalog stamps them
fn default_user() -> String {
    "unknown".to_string()
}

fn default_timestamp() -> DateTime<Utc> {
    DateTime::from_timestamp(0, 0).unwrap_or_else(Utc::now)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CertificateStatus {
    Verified,
    Draft,
    Deprecated,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Certificate {
    pub status: CertificateStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnnouncementType {
    Information,
    Warning,
    Issue,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Announcement {
    #[serde(rename = "type")]
    pub announcement_type: AnnouncementType,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Family-specific attributes, tagged by the catalog type name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "typeName")]
pub enum AssetDetail {
    Connection {
        connector: ConnectorType,
        #[serde(default)]
        admin_users: Vec<String>,
    },
    Database {
        connection_qualified_name: String,
    },
    Schema {
        database_qualified_name: String,
    },
    Table {
        schema_qualified_name: String,
        #[serde(default)]
        row_count: Option<u64>,
    },
    Column {
        table_qualified_name: String,
        order: u32,
        data_type: String,
    },
    #[serde(rename = "AtlasGlossary")]
    Glossary,
    #[serde(rename = "AtlasGlossaryTerm")]
    GlossaryTerm {
        glossary: Guid,
        #[serde(default)]
        categories: Vec<Guid>,
        #[serde(default)]
        see_also: Vec<Guid>,
    },
    #[serde(rename = "AtlasGlossaryCategory")]
    GlossaryCategory {
        glossary: Guid,
        #[serde(default)]
        parent_category: Option<Guid>,
    },
    KafkaTopic {
        connection_qualified_name: String,
        partition_count: u32,
    },
    KafkaConsumerGroup {
        connection_qualified_name: String,
        #[serde(default)]
        topics: Vec<Guid>,
    },
    S3Bucket {
        connection_qualified_name: String,
        region: String,
    },
    S3Object {
        bucket_qualified_name: String,
        key: String,
    },
    Dashboard {
        connection_qualified_name: String,
    },
    Process {
        connection_qualified_name: String,
        #[serde(default)]
        inputs: Vec<Guid>,
        #[serde(default)]
        outputs: Vec<Guid>,
    },
}

impl AssetDetail {
    pub fn asset_type(&self) -> AssetType {
        match self {
            AssetDetail::Connection { .. } => AssetType::Connection,
            AssetDetail::Database { .. } => AssetType::Database,
            AssetDetail::Schema { .. } => AssetType::Schema,
            AssetDetail::Table { .. } => AssetType::Table,
            AssetDetail::Column { .. } => AssetType::Column,
            AssetDetail::Glossary => AssetType::Glossary,
            AssetDetail::GlossaryTerm { .. } => AssetType::GlossaryTerm,
            AssetDetail::GlossaryCategory { .. } => AssetType::GlossaryCategory,
            AssetDetail::KafkaTopic { .. } => AssetType::KafkaTopic,
            AssetDetail::KafkaConsumerGroup { .. } => AssetType::KafkaConsumerGroup,
            AssetDetail::S3Bucket { .. } => AssetType::S3Bucket,
            AssetDetail::S3Object { .. } => AssetType::S3Object,
            AssetDetail::Dashboard { .. } => AssetType::Dashboard,
            AssetDetail::Process { .. } => AssetType::Process,
        }
    }

    /// Qualified name of the containing asset, for families whose parent is addressed that way
    pub fn parent_qualified_name(&self) -> Option<(AssetType, &str)> {
        match self {
            AssetDetail::Database {
                connection_qualified_name,
            }
            | AssetDetail::KafkaTopic {
                connection_qualified_name,
                ..
            }
            | AssetDetail::KafkaConsumerGroup {
                connection_qualified_name,
                ..
            }
            | AssetDetail::S3Bucket {
                connection_qualified_name,
                ..
            }
            | AssetDetail::Dashboard {
                connection_qualified_name,
            }
            | AssetDetail::Process {
                connection_qualified_name,
                ..
            } => Some((AssetType::Connection, connection_qualified_name)),
            AssetDetail::Schema {
                database_qualified_name,
            } => Some((AssetType::Database, database_qualified_name)),
            AssetDetail::Table {
                schema_qualified_name,
                ..
            } => Some((AssetType::Schema, schema_qualified_name)),
            AssetDetail::Column {
                table_qualified_name,
                ..
            } => Some((AssetType::Table, table_qualified_name)),
            AssetDetail::S3Object {
                bucket_qualified_name,
                ..
            } => Some((AssetType::S3Bucket, bucket_qualified_name)),
            AssetDetail::Connection { .. }
            | AssetDetail::Glossary
            | AssetDetail::GlossaryTerm { .. }
            | AssetDetail::GlossaryCategory { .. } => None,
        }
    }

    /// Guid of the anchoring glossary for glossary-family assets
    pub fn glossary_guid(&self) -> Option<&Guid> {
        match self {
            AssetDetail::GlossaryTerm { glossary, .. }
            | AssetDetail::GlossaryCategory { glossary, .. } => Some(glossary),
            _ => None,
        }
    }

    /// Every guid this asset links to through a typed relationship
    pub fn linked_guids(&self) -> Vec<&Guid> {
        match self {
            AssetDetail::GlossaryTerm {
                glossary,
                categories,
                see_also,
            } => std::iter::once(glossary)
                .chain(categories.iter())
                .chain(see_also.iter())
                .collect(),
            AssetDetail::GlossaryCategory {
                glossary,
                parent_category,
            } => std::iter::once(glossary)
                .chain(parent_category.iter())
                .collect(),
            AssetDetail::KafkaConsumerGroup { topics, .. } => topics.iter().collect(),
            AssetDetail::Process {
                inputs, outputs, ..
            } => inputs.iter().chain(outputs.iter()).collect(),
            _ => Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Asset {
    /// Empty until the catalog assigns one on first save
    #[serde(default)]
    pub guid: Guid,
    #[serde(default)]
    pub qualified_name: String,
    pub name: String,
    #[serde(default)]
    pub status: EntityStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub owner_users: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub owner_groups: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub certificate: Option<Certificate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub announcement: Option<Announcement>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    /// Values keyed by internal set name, then internal attribute name
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub custom_metadata: BTreeMap<String, BTreeMap<String, serde_json::Value>>,

    #[serde(default = "default_user")]
    pub created_by: String,
    #[serde(default = "default_timestamp")]
    pub created_at: DateTime<Utc>,
    #[serde(default = "default_user")]
    pub updated_by: String,
    #[serde(default = "default_timestamp")]
    pub updated_at: DateTime<Utc>,

    #[serde(flatten)]
    pub detail: AssetDetail,
}

impl Asset {
    fn new(name: &str, qualified_name: String, detail: AssetDetail) -> Self {
        Self {
            guid: Guid::new(),
            qualified_name,
            name: name.to_string(),
            status: EntityStatus::Active,
            description: None,
            owner_users: Vec::new(),
            owner_groups: Vec::new(),
            certificate: None,
            announcement: None,
            tags: Vec::new(),
            custom_metadata: BTreeMap::new(),
            created_by: default_user(),
            created_at: default_timestamp(),
            updated_by: default_user(),
            updated_at: default_timestamp(),
            detail,
        }
    }

    pub fn connection(name: &str, connector: ConnectorType, admin_users: Vec<String>) -> Self {
        Self::new(
            name,
            connection_qualified_name(connector),
            AssetDetail::Connection {
                connector,
                admin_users,
            },
        )
    }

    pub fn database(name: &str, connection_qualified_name: &str) -> Self {
        Self::new(
            name,
            child_qualified_name(connection_qualified_name, name),
            AssetDetail::Database {
                connection_qualified_name: connection_qualified_name.to_string(),
            },
        )
    }

    pub fn schema(name: &str, database_qualified_name: &str) -> Self {
        Self::new(
            name,
            child_qualified_name(database_qualified_name, name),
            AssetDetail::Schema {
                database_qualified_name: database_qualified_name.to_string(),
            },
        )
    }

    pub fn table(name: &str, schema_qualified_name: &str) -> Self {
        Self::new(
            name,
            child_qualified_name(schema_qualified_name, name),
            AssetDetail::Table {
                schema_qualified_name: schema_qualified_name.to_string(),
                row_count: None,
            },
        )
    }

    pub fn column(name: &str, table_qualified_name: &str, order: u32, data_type: &str) -> Self {
        Self::new(
            name,
            child_qualified_name(table_qualified_name, name),
            AssetDetail::Column {
                table_qualified_name: table_qualified_name.to_string(),
                order,
                data_type: data_type.to_string(),
            },
        )
    }

    /// Glossary qualified names are assigned by the catalog on save
    pub fn glossary(name: &str) -> Self {
        Self::new(name, String::new(), AssetDetail::Glossary)
    }

    pub fn glossary_term(name: &str, glossary_guid: &Guid) -> Self {
        Self::new(
            name,
            String::new(),
            AssetDetail::GlossaryTerm {
                glossary: glossary_guid.clone(),
                categories: Vec::new(),
                see_also: Vec::new(),
            },
        )
    }

    pub fn glossary_category(
        name: &str,
        glossary_guid: &Guid,
        parent_category: Option<&Guid>,
    ) -> Self {
        Self::new(
            name,
            String::new(),
            AssetDetail::GlossaryCategory {
                glossary: glossary_guid.clone(),
                parent_category: parent_category.cloned(),
            },
        )
    }

    pub fn kafka_topic(name: &str, connection_qualified_name: &str, partition_count: u32) -> Self {
        Self::new(
            name,
            child_qualified_name(&format!("{}/topic", connection_qualified_name), name),
            AssetDetail::KafkaTopic {
                connection_qualified_name: connection_qualified_name.to_string(),
                partition_count,
            },
        )
    }

    pub fn kafka_consumer_group(
        name: &str,
        connection_qualified_name: &str,
        topics: Vec<Guid>,
    ) -> Self {
        Self::new(
            name,
            child_qualified_name(&format!("{}/consumer-group", connection_qualified_name), name),
            AssetDetail::KafkaConsumerGroup {
                connection_qualified_name: connection_qualified_name.to_string(),
                topics,
            },
        )
    }

    pub fn s3_bucket(name: &str, connection_qualified_name: &str, region: &str) -> Self {
        Self::new(
            name,
            child_qualified_name(connection_qualified_name, name),
            AssetDetail::S3Bucket {
                connection_qualified_name: connection_qualified_name.to_string(),
                region: region.to_string(),
            },
        )
    }

    pub fn s3_object(name: &str, bucket_qualified_name: &str, key: &str) -> Self {
        Self::new(
            name,
            child_qualified_name(bucket_qualified_name, key),
            AssetDetail::S3Object {
                bucket_qualified_name: bucket_qualified_name.to_string(),
                key: key.to_string(),
            },
        )
    }

    pub fn dashboard(name: &str, connection_qualified_name: &str) -> Self {
        Self::new(
            name,
            child_qualified_name(connection_qualified_name, name),
            AssetDetail::Dashboard {
                connection_qualified_name: connection_qualified_name.to_string(),
            },
        )
    }

    pub fn process(
        name: &str,
        connection_qualified_name: &str,
        inputs: Vec<Guid>,
        outputs: Vec<Guid>,
    ) -> Self {
        Self::new(
            name,
            child_qualified_name(&format!("{}/process", connection_qualified_name), name),
            AssetDetail::Process {
                connection_qualified_name: connection_qualified_name.to_string(),
                inputs,
                outputs,
            },
        )
    }

    pub fn with_description(mut self, description: &str) -> Self {
        self.description = Some(description.to_string());
        self
    }

    pub fn with_owner_groups(mut self, groups: Vec<String>) -> Self {
        self.owner_groups = groups;
        self
    }

    pub fn with_certificate(mut self, status: CertificateStatus, message: Option<&str>) -> Self {
        self.certificate = Some(Certificate {
            status,
            message: message.map(|m| m.to_string()),
        });
        self
    }

    pub fn asset_type(&self) -> AssetType {
        self.detail.asset_type()
    }

    pub fn is_active(&self) -> bool {
        self.status == EntityStatus::Active
    }

    pub fn connector(&self) -> Option<ConnectorType> {
        match &self.detail {
            AssetDetail::Connection { connector, .. } => Some(*connector),
            _ => crate::model::connector_of(&self.qualified_name),
        }
    }

    pub fn see_also(&self) -> &[Guid] {
        match &self.detail {
            AssetDetail::GlossaryTerm { see_also, .. } => see_also,
            _ => &[],
        }
    }

    pub fn parent_category(&self) -> Option<&Guid> {
        match &self.detail {
            AssetDetail::GlossaryCategory {
                parent_category, ..
            } => parent_category.as_ref(),
            _ => None,
        }
    }

    pub fn consumer_group_topics(&self) -> &[Guid] {
        match &self.detail {
            AssetDetail::KafkaConsumerGroup { topics, .. } => topics,
            _ => &[],
        }
    }

    /// Value of a custom-metadata attribute by internal names
    pub fn custom_metadata_value(&self, set: &str, attribute: &str) -> Option<&serde_json::Value> {
        self.custom_metadata.get(set).and_then(|values| values.get(attribute))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_sql_qualified_names_follow_ancestry() {
        let connection = Asset::connection("conn", ConnectorType::Snowflake, vec![]);
        let database = Asset::database("db", &connection.qualified_name);
        let schema = Asset::schema("sch", &database.qualified_name);
        let table = Asset::table("tbl", &schema.qualified_name);
        let column = Asset::column("col", &table.qualified_name, 1, "VARCHAR");

        assert_eq!(
            column.qualified_name,
            format!("{}/db/sch/tbl/col", connection.qualified_name)
        );
        for asset in [&connection, &database, &schema, &table, &column] {
            assert_ne!(asset.qualified_name, asset.name);
        }
        assert_eq!(
            table.detail.parent_qualified_name(),
            Some((AssetType::Schema, schema.qualified_name.as_str()))
        );
        assert_eq!(column.connector(), Some(ConnectorType::Snowflake));
    }

    #[test]
    fn test_asset_detail_is_tagged_by_type_name() {
        let term = Asset::glossary_term("Revenue", &"g-1".to_string());
        let value = serde_json::to_value(&term).unwrap();
        assert_eq!(value["typeName"], json!("AtlasGlossaryTerm"));
        assert_eq!(value["glossary"], json!("g-1"));

        let decoded: Asset = serde_json::from_value(json!({
            "guid": "abc",
            "qualifiedName": "default/kafka/1/topic/orders",
            "name": "orders",
            "typeName": "KafkaTopic",
            "connection_qualified_name": "default/kafka/1",
            "partition_count": 3
        }))
        .unwrap();
        assert_eq!(decoded.asset_type(), AssetType::KafkaTopic);
        assert_eq!(decoded.status, EntityStatus::Active);
        assert!(matches!(
            decoded.detail,
            AssetDetail::KafkaTopic {
                partition_count: 3,
                ..
            }
        ));
    }

    #[test]
    fn test_linked_guids_cover_typed_relationships() {
        let mut term = Asset::glossary_term("A", &"g".to_string());
        if let AssetDetail::GlossaryTerm { see_also, .. } = &mut term.detail {
            see_also.push("t2".to_string());
        }
        let linked: Vec<&Guid> = term.detail.linked_guids();
        assert_eq!(linked, vec![&"g".to_string(), &"t2".to_string()]);

        let process = Asset::process(
            "p",
            "default/postgres/1",
            vec!["a".to_string()],
            vec!["b".to_string()],
        );
        assert_eq!(process.detail.linked_guids().len(), 2);
    }
}
