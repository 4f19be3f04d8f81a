use crate::protocol::StmtResult;
use base64::Engine;
use rusqlite::Connection;

// Statements with this prefix run through the mutating primitive, which
// captures the last-inserted-id and affected-row count. Everything else runs
// through the read primitive. Classification is purely textual.
const INSERT_PREFIX: &str = "INSERT INTO";

pub fn is_insert(sql: &str) -> bool {
    sql.get(..INSERT_PREFIX.len())
        .map_or(false, |prefix| prefix.eq_ignore_ascii_case(INSERT_PREFIX))
}

/// Execute one SQL statement against `conn`, normalizing the raw engine
/// outcome into a success or error envelope. Engine failures are captured
/// in-band: this function never surfaces them through the error channel.
pub fn execute(conn: &Connection, sql: &str, params: &[serde_json::Value]) -> StmtResult {
    match invoke(conn, sql, params) {
        Ok(outcome) => format_outcome(outcome),
        Err(err) => StmtResult::Error {
            code: 0,
            message: err.to_string(),
        },
    }
}

// Raw outcome of an executed statement, prior to normalization.
enum Outcome {
    Run { changes: usize, last_insert_id: i64 },
    Rows(Vec<serde_json::Value>),
}

fn invoke(
    conn: &Connection,
    sql: &str,
    params: &[serde_json::Value],
) -> rusqlite::Result<Outcome> {
    let mut stmt = conn.prepare(sql)?;

    for (index, param) in params.iter().enumerate() {
        bind_parameter(&mut stmt, index, param)?;
    }

    if is_insert(sql) {
        let changes = stmt.raw_execute()?;
        Ok(Outcome::Run {
            changes,
            last_insert_id: conn.last_insert_rowid(),
        })
    } else {
        let columns: Vec<String> = stmt.column_names().iter().map(|c| c.to_string()).collect();

        let mut out = Vec::new();
        let mut rows = stmt.raw_query();
        while let Some(row) = rows.next()? {
            out.push(row_to_json(&columns, row)?);
        }
        Ok(Outcome::Rows(out))
    }
}

// A non-zero change count reports insertId and rowsAffected; everything else
// reports rows with rowsAffected 0.
fn format_outcome(outcome: Outcome) -> StmtResult {
    match outcome {
        Outcome::Run {
            changes,
            last_insert_id,
        } if changes != 0 => StmtResult::Success {
            rows: Vec::new(),
            insert_id: Some(last_insert_id),
            rows_affected: changes,
        },
        Outcome::Run { .. } => StmtResult::Success {
            rows: Vec::new(),
            insert_id: None,
            rows_affected: 0,
        },
        Outcome::Rows(rows) => StmtResult::Success {
            rows,
            insert_id: None,
            rows_affected: 0,
        },
    }
}

fn bind_parameter(
    stmt: &mut rusqlite::Statement<'_>,
    index: usize,
    param: &serde_json::Value,
) -> rusqlite::Result<()> {
    use serde_json::Value;

    match param {
        Value::Null => stmt.raw_bind_parameter(index + 1, None::<bool>),
        Value::Bool(b) => stmt.raw_bind_parameter(index + 1, b),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                stmt.raw_bind_parameter(index + 1, i)
            } else if let Some(u) = n.as_u64() {
                stmt.raw_bind_parameter(index + 1, u)
            } else {
                stmt.raw_bind_parameter(index + 1, n.as_f64())
            }
        }
        Value::String(s) => stmt.raw_bind_parameter(index + 1, s),
        // Arrays and objects bind as their JSON text.
        Value::Array(_) | Value::Object(_) => {
            stmt.raw_bind_parameter(index + 1, serde_json::to_string(param).unwrap())
        }
    }
}

fn row_to_json(
    columns: &[String],
    row: &rusqlite::Row<'_>,
) -> rusqlite::Result<serde_json::Value> {
    let mut out = serde_json::Map::with_capacity(columns.len());
    for (index, name) in columns.iter().enumerate() {
        out.insert(name.clone(), convert_value_ref(row.get_ref(index)?));
    }
    Ok(serde_json::Value::Object(out))
}

// SQLite types map to corresponding JSON types null, integer, float, and
// string. BLOBs are base64, as an envelope must be valid JSON.
fn convert_value_ref(value: rusqlite::types::ValueRef<'_>) -> serde_json::Value {
    use rusqlite::types::ValueRef;
    use serde_json::{Number, Value};

    match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(i) => Value::Number(Number::from(i)),
        ValueRef::Real(f) => match Number::from_f64(f) {
            Some(n) => Value::Number(n),
            None => Value::String(format!("{f}")),
        },
        ValueRef::Text(s) => Value::String(String::from_utf8_lossy(s).to_string()),
        ValueRef::Blob(b) => Value::String(base64::engine::general_purpose::STANDARD.encode(b)),
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_statement_classification() {
        assert!(is_insert("INSERT INTO t VALUES (1)"));
        assert!(is_insert("insert into t values (1)"));
        assert!(is_insert("Insert Into t SELECT * FROM s"));

        assert!(!is_insert("INSERT OR REPLACE INTO t VALUES (1)"));
        assert!(!is_insert("SELECT 1"));
        assert!(!is_insert("UPDATE t SET x = 1"));
        assert!(!is_insert("INSERT"));
        assert!(!is_insert(""));
        // Leading whitespace is not stripped before classification.
        assert!(!is_insert(" INSERT INTO t VALUES (1)"));
    }

    #[test]
    fn test_insert_envelope() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch("CREATE TABLE t (id INTEGER PRIMARY KEY, v TEXT);")
            .unwrap();

        let result = execute(
            &conn,
            "INSERT INTO t (v) VALUES (?1), (?2)",
            &[json!("a"), json!("b")],
        );
        assert_eq!(
            serde_json::to_value(&result).unwrap(),
            json!({"type": "success", "rows": [], "insertId": 2, "rowsAffected": 2}),
        );
    }

    #[test]
    fn test_insert_with_no_change() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch("CREATE TABLE t (id INTEGER PRIMARY KEY);")
            .unwrap();

        // Insert-like by prefix, but affecting zero rows: no insertId.
        let result = execute(&conn, "INSERT INTO t SELECT * FROM t WHERE 0", &[]);
        assert_eq!(
            serde_json::to_value(&result).unwrap(),
            json!({"type": "success", "rows": [], "rowsAffected": 0}),
        );
    }

    #[test]
    fn test_select_envelope() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(
            r#"
            CREATE TABLE t (id INTEGER PRIMARY KEY, v TEXT);
            INSERT INTO t (v) VALUES ('a'), ('b');
            "#,
        )
        .unwrap();

        let result = execute(&conn, "SELECT id, v FROM t ORDER BY id", &[]);
        assert_eq!(
            serde_json::to_value(&result).unwrap(),
            json!({
                "type": "success",
                "rows": [{"id": 1, "v": "a"}, {"id": 2, "v": "b"}],
                "rowsAffected": 0,
            }),
        );
    }

    #[test]
    fn test_parameter_and_value_conversions() {
        let conn = Connection::open_in_memory().unwrap();

        let result = execute(
            &conn,
            r#"
            SELECT ?1 AS n, ?2 AS b, ?3 AS i, ?4 AS f, ?5 AS s,
                   ?6 AS arr, ?7 AS obj, CAST('raw' AS BLOB) AS blob
            "#,
            &[
                json!(null),
                json!(true),
                json!(-42),
                json!(2.5),
                json!("hello"),
                json!([1, 2]),
                json!({"k": "v"}),
            ],
        );
        assert_eq!(
            serde_json::to_value(&result).unwrap(),
            json!({
                "type": "success",
                "rows": [{
                    "n": null,
                    "b": 1,
                    "i": -42,
                    "f": 2.5,
                    "s": "hello",
                    "arr": "[1,2]",
                    "obj": "{\"k\":\"v\"}",
                    "blob": "cmF3",
                }],
                "rowsAffected": 0,
            }),
        );
    }

    #[test]
    fn test_error_envelope() {
        let conn = Connection::open_in_memory().unwrap();

        let result = execute(&conn, "SELECT * FROM missing", &[]);
        match result {
            StmtResult::Error { code, message } => {
                assert_eq!(code, 0);
                assert!(message.contains("no such table: missing"), "{message}");
            }
            result => panic!("unexpected envelope: {result:?}"),
        }
    }
}
