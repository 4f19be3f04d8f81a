use crate::protocol::{
    BatchRequest, CloseRequest, DeleteRequest, EchoRequest, OpenRequest, Request, Response,
    StmtResult,
};
use crate::registry::{Handle, Registry};
use crate::{exec, Config, Error};

/// Bridge adapts host calls into operations against the SQLite engine,
/// tracking named databases in its registry.
pub struct Bridge {
    config: Config,
    registry: Registry,
}

impl Bridge {
    pub fn new(config: Config) -> Self {
        Self {
            config,
            registry: Registry::new(),
        }
    }

    /// Open the named database, creating it if it doesn't exist yet.
    pub async fn open(&self, request: OpenRequest) -> Result<(), Error> {
        let path = self.config.database_path(&request.name);
        self.registry.open(&request.name, &path)
    }

    /// Close the named database, retaining its handle for later re-opening.
    pub async fn close(&self, request: CloseRequest) -> Result<(), Error> {
        self.registry.close(&request.name)
    }

    /// Delete the named database, closing it first when still open.
    pub async fn delete(&self, request: DeleteRequest) -> Result<(), Error> {
        self.registry.delete(&request.name)
    }

    /// Execute an ordered batch of statements against one open database,
    /// returning one envelope per statement in input order. A statement's
    /// error envelope does not stop the batch.
    pub async fn execute_batch(&self, request: BatchRequest) -> Result<Vec<StmtResult>, Error> {
        let BatchRequest { name, statements } = request;

        let handle = match self.registry.handle(&name) {
            Some(handle) => handle,
            None => return Err(Error::BatchNotOpen { name }),
        };

        let mut results = Vec::with_capacity(statements.len());
        for statement in &statements {
            // Statements execute strictly sequentially: each completes and
            // is formatted before the next is issued.
            let result = self
                .execute_sql(&handle, &statement.sql, &statement.params)
                .await;
            results.push(result);
        }
        Ok(results)
    }

    /// Return the input unchanged. Connectivity probe of the call boundary.
    pub async fn echo(&self, request: EchoRequest) -> serde_json::Value {
        request.value
    }

    /// Serve one request arriving over the host boundary, mapping lifecycle
    /// failures into the wire error response.
    pub async fn serve(&self, request: Request) -> Response {
        tracing::debug!(?request, "serving bridge request");

        if let Err(err) = request.validate() {
            return Response::Error {
                message: err.to_string(),
            };
        }

        let result = match request {
            Request::Open(request) => self.open(request).await.map(|()| Response::Ok),
            Request::Close(request) => self.close(request).await.map(|()| Response::Ok),
            Request::Delete(request) => self.delete(request).await.map(|()| Response::Ok),
            Request::BackgroundExecuteSqlBatch(request) => self
                .execute_batch(request)
                .await
                .map(|results| Response::Results { results }),
            Request::EchoStringValue(request) => Ok(Response::Echo {
                value: self.echo(request).await,
            }),
        };

        result.unwrap_or_else(|err| {
            let err = anyhow::Error::new(err);
            Response::Error {
                message: format!("{err:#}"),
            }
        })
    }

    async fn execute_sql(
        &self,
        handle: &Handle,
        sql: &str,
        params: &[serde_json::Value],
    ) -> StmtResult {
        let conn = handle.lock();
        exec::execute(&conn, sql, params)
    }
}
