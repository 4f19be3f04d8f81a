use super::Error;

/// A single SQL statement and its positional parameters.
#[derive(serde::Serialize, serde::Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct SqlStatement {
    pub sql: String,
    #[serde(default)]
    pub params: Vec<serde_json::Value>,
}

#[derive(serde::Serialize, serde::Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct OpenRequest {
    pub name: String,
}

#[derive(serde::Serialize, serde::Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct CloseRequest {
    pub name: String,
}

#[derive(serde::Serialize, serde::Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct DeleteRequest {
    pub name: String,
}

/// An ordered batch of statements to execute against one open database.
#[derive(serde::Serialize, serde::Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct BatchRequest {
    pub name: String,
    pub statements: Vec<SqlStatement>,
}

#[derive(serde::Serialize, serde::Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct EchoRequest {
    pub value: serde_json::Value,
}

/// Request is one call arriving over the host boundary, tagged with the
/// name of the operation it invokes.
#[derive(serde::Serialize, serde::Deserialize, Debug, Clone)]
#[serde(tag = "operation", rename_all = "camelCase")]
pub enum Request {
    Open(OpenRequest),
    Close(CloseRequest),
    Delete(DeleteRequest),
    BackgroundExecuteSqlBatch(BatchRequest),
    EchoStringValue(EchoRequest),
}

impl Request {
    /// Validate a request at the call boundary, before it reaches core logic.
    pub fn validate(&self) -> Result<(), Error> {
        let name = match self {
            Request::Open(OpenRequest { name })
            | Request::Close(CloseRequest { name })
            | Request::Delete(DeleteRequest { name }) => name,
            Request::BackgroundExecuteSqlBatch(BatchRequest { name, .. }) => name,
            Request::EchoStringValue(_) => return Ok(()),
        };

        if name.is_empty() {
            return Err(Error::Invalid {
                reason: "database name must not be empty".to_string(),
            });
        }
        Ok(())
    }
}

/// Response mirrors Request: one is written back to the host per served call.
#[derive(serde::Serialize, serde::Deserialize, Debug, Clone)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Response {
    /// A lifecycle operation completed.
    Ok,
    /// Ordered per-statement envelopes of an executed batch.
    #[serde(rename_all = "camelCase")]
    Results { results: Vec<StmtResult> },
    /// The echoed value.
    #[serde(rename_all = "camelCase")]
    Echo { value: serde_json::Value },
    /// A lifecycle operation failed.
    #[serde(rename_all = "camelCase")]
    Error { message: String },
}

/// Normalized outcome of one executed statement. Engine failures are
/// captured here as values: a batch collects envelopes, it never throws.
#[derive(serde::Serialize, serde::Deserialize, Debug, Clone, PartialEq)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum StmtResult {
    #[serde(rename_all = "camelCase")]
    Success {
        rows: Vec<serde_json::Value>,
        #[serde(skip_serializing_if = "Option::is_none")]
        insert_id: Option<i64>,
        rows_affected: usize,
    },
    #[serde(rename_all = "camelCase")]
    Error { code: i64, message: String },
}
