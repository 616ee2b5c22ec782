//! Linear-trace interpreter.

use std::collections::HashMap;

use anyhow::Result;
use shapefuzz_types::{ApiCallArg, ApiSeq, CallId, Schema};
use tracing::debug;

use super::data::ByteProvider;
use super::invoke::invoke;
use super::oracle::{with_oracle, Oracle, Verdict};
use super::Abort;
use crate::config::WorkerConfig;
use crate::reflect::{load_schema, Endpoints, LoadedSchema};
use crate::runtime::{ModuleLoader, Value};

/// Run every call of `seq` in order, counting completed calls in `executed`.
async fn interpret(
    endpoints: &Endpoints,
    config: &WorkerConfig,
    seq: &ApiSeq,
    executed: &mut usize,
) -> Result<(), Abort> {
    let mut provider = ByteProvider::new(&seq.fuzz, config);
    let mut results: HashMap<CallId, Value> = HashMap::with_capacity(seq.seq.len());

    for call in &seq.seq {
        if results.contains_key(&call.id) {
            return Err(Abort::violation(format!("duplicate call id {}", call.id)));
        }
        let endpoint = endpoints
            .get(&call.name)
            .ok_or_else(|| Abort::violation(format!("no endpoint named {}", call.name)))?;

        let mut args = Vec::with_capacity(call.args.len());
        for (position, arg) in call.args.iter().enumerate() {
            let value = match arg {
                ApiCallArg::Output(src) => results.get(src).cloned().ok_or_else(|| {
                    Abort::violation(format!(
                        "call {} uses the output of call {} before it ran",
                        call.id, src
                    ))
                })?,
                ApiCallArg::Constant(typ) => provider.value(typ)?,
                ApiCallArg::Missing => {
                    return Err(Abort::violation(format!(
                        "call {} ({}) has no value for argument {}",
                        call.id, call.name, position
                    )))
                }
            };
            args.push(value);
        }

        debug!(call = call.id, endpoint = %call.name, "sequence call");
        let value = invoke(&call.name, endpoint, call.conv, args).await?;
        *executed += 1;
        results.insert(call.id, value);
    }
    Ok(())
}

/// Long-lived worker executing call sequences against one loaded module.
pub struct SequenceExecutor {
    loaded: LoadedSchema,
    config: WorkerConfig,
    oracle: Box<dyn Oracle>,
    executed: usize,
}

impl SequenceExecutor {
    /// Load `specifier` and bind its endpoints, deriving or refining `schema`.
    pub async fn init(
        loader: &dyn ModuleLoader,
        specifier: &str,
        schema: Option<Schema>,
        config: WorkerConfig,
        oracle: Box<dyn Oracle>,
    ) -> Result<Self> {
        let loaded = load_schema(loader, specifier, schema, &config).await?;
        Ok(Self::from_loaded(loaded, config, oracle))
    }

    pub fn from_loaded(
        loaded: LoadedSchema,
        config: WorkerConfig,
        oracle: Box<dyn Oracle>,
    ) -> Self {
        Self {
            loaded,
            config,
            oracle,
            executed: 0,
        }
    }

    pub fn schema(&self) -> &Schema {
        &self.loaded.schema
    }

    /// Calls completed by the most recent [`execute`](Self::execute). Less than the
    /// sequence length when an exception ended it early.
    pub fn num_executed(&self) -> usize {
        self.executed
    }

    pub async fn execute(&mut self, seq: &ApiSeq) -> Result<Verdict> {
        let mut executed = 0;
        let verdict = with_oracle(
            self.oracle.as_ref(),
            self.config.log_errors,
            interpret(&self.loaded.endpoints, &self.config, seq, &mut executed),
        )
        .await;
        self.executed = executed;
        verdict
    }
}

#[cfg(test)]
mod tests {
    use shapefuzz_types::{ApiCall, CallConvention, Type};

    use super::*;
    use crate::runtime::{new_function, FunctionFlavor, Invocation};

    fn endpoints() -> Endpoints {
        let mut endpoints = Endpoints::new();
        endpoints.insert(
            "len".to_string(),
            new_function("len", 1, FunctionFlavor::Arrow, |inv: Invocation| {
                let len = inv.arg(0).as_str().map(str::len).unwrap_or(0);
                Ok(Value::Number(len as f64))
            }),
        );
        endpoints.insert(
            "double".to_string(),
            new_function("double", 1, FunctionFlavor::Arrow, |inv: Invocation| {
                Ok(Value::Number(inv.arg(0).as_number().unwrap_or(0.0) * 2.0))
            }),
        );
        endpoints
    }

    fn call(id: CallId, name: &str, args: Vec<ApiCallArg>) -> ApiCall {
        ApiCall {
            id,
            name: name.to_string(),
            args,
            conv: CallConvention::Free,
        }
    }

    #[tokio::test]
    async fn test_outputs_feed_later_calls() {
        let seq = ApiSeq {
            fuzz: vec![3, b'a', b'b', b'c'],
            seq: vec![
                call(0, "len", vec![ApiCallArg::Constant(Type::String)]),
                call(1, "double", vec![ApiCallArg::Output(0)]),
            ],
        };
        let mut executed = 0;
        interpret(&endpoints(), &WorkerConfig::default(), &seq, &mut executed)
            .await
            .unwrap();
        assert_eq!(executed, 2);
    }

    #[tokio::test]
    async fn test_contract_violations() {
        let config = WorkerConfig::default();
        let cases = vec![
            vec![call(0, "double", vec![ApiCallArg::Output(7)])],
            vec![call(0, "double", vec![ApiCallArg::Missing])],
            vec![call(0, "nope", vec![])],
            vec![
                call(0, "double", vec![ApiCallArg::Constant(Type::Number)]),
                call(0, "double", vec![ApiCallArg::Constant(Type::Number)]),
            ],
        ];
        for seq in cases {
            let seq = ApiSeq { fuzz: vec![], seq };
            let mut executed = 0;
            let err = interpret(&endpoints(), &config, &seq, &mut executed)
                .await
                .unwrap_err();
            assert!(matches!(err, Abort::Violation(_)), "{}", err);
        }
    }
}
