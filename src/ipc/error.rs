use serde_json::json;

pub fn ok(id: &str, result: serde_json::Value) -> serde_json::Value {
    json!({
        "id": id,
        "ok": true,
        "result": result
    })
}

pub fn err(
    id: &str,
    code: &str,
    message: impl Into<String>,
    details: Option<serde_json::Value>,
) -> serde_json::Value {
    let mut error = json!({
        "code": code,
        "message": message.into(),
    });
    if let Some(d) = details {
        error["details"] = d;
    }
    json!({
        "id": id,
        "ok": false,
        "error": error,
    })
}

#[derive(Debug)]
pub struct HandlerErr {
    pub code: &'static str,
    pub message: String,
    pub details: Option<serde_json::Value>,
}

impl HandlerErr {
    pub fn new(code: &'static str, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            details: None,
        }
    }

    /// Object details merge into any already attached.
    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        match (&mut self.details, details) {
            (Some(serde_json::Value::Object(existing)), serde_json::Value::Object(extra)) => {
                existing.extend(extra);
            }
            (slot, details) => *slot = Some(details),
        }
        self
    }

    pub fn bad_params(message: impl Into<String>) -> Self {
        Self::new("bad_params", message)
    }

    pub fn not_found(what: &str) -> Self {
        Self::new("not_found", format!("{} not found", what))
    }

    /// Wraps a store failure, tagging the table it touched when known.
    pub fn db(code: &'static str, e: rusqlite::Error, table: Option<&str>) -> Self {
        let err = Self::new(code, e.to_string());
        match table {
            Some(t) => err.with_details(json!({ "table": t })),
            None => err,
        }
    }

    pub fn response(self, id: &str) -> serde_json::Value {
        err(id, self.code, self.message, self.details)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn details_merge_and_render_into_envelope() {
        let e = HandlerErr::new("conflict", "taken")
            .with_details(json!({ "code": "CS201" }))
            .with_details(json!({ "index": 2 }));
        let resp = e.response("r1");
        assert_eq!(resp["ok"], json!(false));
        assert_eq!(resp["error"]["code"], json!("conflict"));
        assert_eq!(resp["error"]["details"], json!({ "code": "CS201", "index": 2 }));
    }

    #[test]
    fn ok_envelope_carries_result() {
        let resp = ok("r2", json!({ "n": 1 }));
        assert_eq!(resp["id"], json!("r2"));
        assert_eq!(resp["result"]["n"], json!(1));
    }
}
