//! Terminology graph store collaborator
//!
//! The graph engine itself is external; this module specifies its boundary
//! ([`GraphStore`]) and provides a client for the Neo4j transactional
//! Cypher HTTP endpoint. Three queries exist: preferred-term concept
//! lookup (exact then contains), bounded-depth is-a hierarchy expansion,
//! and a one-shot vocabulary listing for the fuzzy-match cache.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::time::Duration;

use crate::config::GraphConfig;
use crate::error::{Error, Result};
use crate::models::{ConceptMatch, EvidencePair};

/// Description type id for preferred terms
const PREFERRED_TERM_TYPE: &str = "900000000000003001";

/// Relationship type id for is-a
const IS_A_TYPE: &str = "116680003";

/// Maximum hierarchy expansion depth
pub const MAX_DEPTH: usize = 3;

/// Maximum pairs returned per concept
pub const MAX_PAIRS: usize = 50;

/// Boundary of the terminology-graph collaborator
#[async_trait]
pub trait GraphStore: Send + Sync {
    /// Concepts whose preferred-term label matches `term` exactly or by
    /// containment, best five, exact matches first
    async fn match_concepts(&self, term: &str) -> Result<Vec<ConceptMatch>>;

    /// Is-a relation endpoint labels reachable from `concept_id` within
    /// depth 1..=3, capped at 50 pairs
    async fn fetch_hierarchy(&self, concept_id: &str) -> Result<Vec<EvidencePair>>;

    /// Lowercased vocabulary labels for approximate matching; called at
    /// most once per process, best-effort
    async fn list_vocabulary(&self, limit: usize) -> Result<Vec<String>>;
}

const LOOKUP_CYPHER: &str = r#"
// exact match first
MATCH (d:Description)-[:DESCRIBES]->(c:Concept)
WHERE toLower(d.term) = toLower($t)
  AND d.typeId = $typeId
  AND NOT toLower(d.term) CONTAINS 'screening'
RETURN DISTINCT c.conceptId AS conceptId, d.term AS term, 100 AS score
UNION
// then contains
MATCH (d:Description)-[:DESCRIBES]->(c:Concept)
WHERE toLower(d.term) CONTAINS toLower($t)
  AND d.typeId = $typeId
  AND NOT toLower(d.term) CONTAINS 'screening'
RETURN DISTINCT c.conceptId AS conceptId, d.term AS term, 50 AS score
ORDER BY score DESC, size(term) ASC
LIMIT 5
"#;

const HIERARCHY_CYPHER: &str = r#"
MATCH path=(c:Concept {conceptId: $conceptId})-[:HAS_RELATIONSHIP*1..3]->(related:Concept)
WHERE ALL(r IN relationships(path) WHERE r.typeId = $isA)
OPTIONAL MATCH (c)<-[:DESCRIBES]-(cd:Description)
OPTIONAL MATCH (related)<-[:DESCRIBES]-(rd:Description)
WITH DISTINCT cd.term AS sourceTerm, rd.term AS targetTerm
RETURN sourceTerm, targetTerm
LIMIT 50
"#;

const VOCAB_CYPHER: &str = "MATCH (c:Concept) RETURN toLower(c.term) AS t LIMIT $limit";

#[derive(Debug, Serialize)]
struct CypherStatement<'a> {
    statement: &'a str,
    parameters: Value,
}

#[derive(Debug, Serialize)]
struct CypherRequest<'a> {
    statements: Vec<CypherStatement<'a>>,
}

#[derive(Debug, Deserialize)]
struct CypherResponse {
    #[serde(default)]
    results: Vec<CypherResult>,
    #[serde(default)]
    errors: Vec<CypherError>,
}

#[derive(Debug, Deserialize)]
struct CypherResult {
    #[serde(default)]
    data: Vec<CypherRow>,
}

#[derive(Debug, Deserialize)]
struct CypherRow {
    #[serde(default)]
    row: Vec<Value>,
}

#[derive(Debug, Deserialize)]
struct CypherError {
    #[serde(default)]
    code: String,
    #[serde(default)]
    message: String,
}

/// Client for the Neo4j transactional Cypher HTTP endpoint
pub struct Neo4jStore {
    client: Client,
    config: GraphConfig,
}

impl Neo4jStore {
    pub fn new(config: GraphConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(Error::Http)?;

        Ok(Self { client, config })
    }

    /// Run one Cypher statement, returning the raw result rows
    async fn run(&self, statement: &str, parameters: Value) -> Result<Vec<Vec<Value>>> {
        let url = format!(
            "{}/db/neo4j/tx/commit",
            self.config.url.trim_end_matches('/')
        );

        let request = CypherRequest {
            statements: vec![CypherStatement {
                statement,
                parameters,
            }],
        };

        let response = self
            .client
            .post(&url)
            .basic_auth(&self.config.user, Some(&self.config.password))
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Error::graph(format!(
                "graph endpoint returned {}",
                response.status()
            )));
        }

        let parsed: CypherResponse = response.json().await?;
        if let Some(err) = parsed.errors.first() {
            return Err(Error::graph(format!("{}: {}", err.code, err.message)));
        }

        Ok(parsed
            .results
            .into_iter()
            .flat_map(|r| r.data)
            .map(|d| d.row)
            .collect())
    }
}

fn row_str(row: &[Value], idx: usize) -> Option<String> {
    row.get(idx).and_then(|v| v.as_str()).map(|s| s.to_string())
}

#[async_trait]
impl GraphStore for Neo4jStore {
    async fn match_concepts(&self, term: &str) -> Result<Vec<ConceptMatch>> {
        let term = term.trim();
        if term.is_empty() {
            return Ok(Vec::new());
        }

        let rows = self
            .run(LOOKUP_CYPHER, json!({ "t": term, "typeId": PREFERRED_TERM_TYPE }))
            .await?;

        Ok(rows
            .iter()
            .filter_map(|row| {
                Some(ConceptMatch {
                    concept_id: row_str(row, 0)?,
                    label: row_str(row, 1)?,
                })
            })
            .collect())
    }

    async fn fetch_hierarchy(&self, concept_id: &str) -> Result<Vec<EvidencePair>> {
        let rows = self
            .run(
                HIERARCHY_CYPHER,
                json!({ "conceptId": concept_id, "isA": IS_A_TYPE }),
            )
            .await?;

        // OPTIONAL MATCH may yield null endpoints; those rows are dropped
        Ok(rows
            .iter()
            .filter_map(|row| {
                let pair = EvidencePair::new(row_str(row, 0)?, row_str(row, 1)?);
                pair.is_valid().then_some(pair)
            })
            .collect())
    }

    async fn list_vocabulary(&self, limit: usize) -> Result<Vec<String>> {
        let rows = self.run(VOCAB_CYPHER, json!({ "limit": limit })).await?;
        Ok(rows.iter().filter_map(|row| row_str(row, 0)).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config(url: String) -> GraphConfig {
        GraphConfig {
            url,
            user: "neo4j".to_string(),
            password: "neo4j".to_string(),
            timeout_secs: 5,
            vocab_limit: 1000,
        }
    }

    #[tokio::test]
    async fn test_match_concepts_parses_rows() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/db/neo4j/tx/commit")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                r#"{"results":[{"columns":["conceptId","term","score"],
                    "data":[{"row":["195967001","Asthma",100]},
                            {"row":["57546000","Asthma attack",50]}]}],"errors":[]}"#,
            )
            .create_async()
            .await;

        let store = Neo4jStore::new(test_config(server.url())).unwrap();
        let matches = store.match_concepts("asthma").await.unwrap();
        assert_eq!(matches.len(), 2);
        assert_eq!(matches[0].concept_id, "195967001");
        assert_eq!(matches[0].label, "Asthma");
    }

    #[tokio::test]
    async fn test_blank_term_short_circuits() {
        let store = Neo4jStore::new(test_config("http://localhost:7474".to_string())).unwrap();
        assert!(store.match_concepts("  ").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_hierarchy_drops_null_endpoints() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/db/neo4j/tx/commit")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                r#"{"results":[{"columns":["sourceTerm","targetTerm"],
                    "data":[{"row":["Asthma","Respiratory disease"]},
                            {"row":["Asthma",null]}]}],"errors":[]}"#,
            )
            .create_async()
            .await;

        let store = Neo4jStore::new(test_config(server.url())).unwrap();
        let pairs = store.fetch_hierarchy("195967001").await.unwrap();
        assert_eq!(pairs.len(), 1);
        assert_eq!(pairs[0].text(), "Asthma → Respiratory disease");
    }

    #[tokio::test]
    async fn test_cypher_error_surfaces() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/db/neo4j/tx/commit")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                r#"{"results":[],"errors":[{"code":"Neo.ClientError.Statement.SyntaxError","message":"bad"}]}"#,
            )
            .create_async()
            .await;

        let store = Neo4jStore::new(test_config(server.url())).unwrap();
        assert!(store.match_concepts("asthma").await.is_err());
    }
}
