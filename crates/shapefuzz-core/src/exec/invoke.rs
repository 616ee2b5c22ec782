//! Dispatch by calling convention.

use shapefuzz_types::CallConvention;
use tracing::debug;

use super::Abort;
use crate::runtime::Value;

/// Invoke `endpoint` under `callconv` and await the result.
///
/// `Method` takes its receiver from `args[0]`; `Constructor` uses constructor semantics;
/// `Free` is a plain call with an undefined receiver.
pub async fn invoke(
    name: &str,
    endpoint: &Value,
    callconv: CallConvention,
    args: Vec<Value>,
) -> Result<Value, Abort> {
    if !endpoint.is_callable() {
        return Err(Abort::violation(format!(
            "endpoint {} is bound to a non-callable value",
            name
        )));
    }
    debug!(endpoint = name, ?callconv, argc = args.len(), "invoke");

    let result = match callconv {
        CallConvention::Free => endpoint.call(Value::Undefined, args),
        CallConvention::Constructor => endpoint.construct(args),
        CallConvention::Method => {
            let mut args = args.into_iter();
            let receiver = args.next().ok_or_else(|| {
                Abort::violation(format!("method {} invoked without a receiver", name))
            })?;
            endpoint.call(receiver, args.collect())
        }
    }?;

    Ok(result.settle().await?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::{
        new_function, ClassBuilder, ErrorName, FunctionFlavor, Invocation, Thrown,
    };

    fn counter_class() -> Value {
        ClassBuilder::new("Counter", 1, |inv: Invocation| {
            let this = inv.this_object()?;
            this.set("count", inv.arg(0));
            Ok(Value::Undefined)
        })
        .method("bump", 1, |inv: Invocation| {
            let this = inv.this_object()?;
            let count = this.get("count").as_number().unwrap_or(0.0);
            let by = inv.arg(0).as_number().unwrap_or(1.0);
            this.set("count", Value::Number(count + by));
            Ok(Value::Number(count + by))
        })
        .build()
    }

    #[tokio::test]
    async fn test_method_binds_receiver() {
        let class = counter_class();
        let args = vec![Value::Number(2.0)];
        let instance = invoke("Counter", &class, CallConvention::Constructor, args)
            .await
            .unwrap();
        assert!(instance.instance_of(&class));

        let bump = class.get("prototype").get("bump");
        let out = invoke(
            "Counter.bump",
            &bump,
            CallConvention::Method,
            vec![instance.clone(), Value::Number(3.0)],
        )
        .await
        .unwrap();
        assert_eq!(out.as_number(), Some(5.0));
        assert_eq!(instance.get("count").as_number(), Some(5.0));
    }

    #[tokio::test]
    async fn test_method_without_receiver_is_violation() {
        let bump = counter_class().get("prototype").get("bump");
        let err = invoke("Counter.bump", &bump, CallConvention::Method, vec![])
            .await
            .unwrap_err();
        assert!(matches!(err, Abort::Violation(_)));
    }

    #[tokio::test]
    async fn test_free_call_awaits_promise() {
        let f = new_function("later", 0, FunctionFlavor::Arrow, |_| {
            Ok(Value::promise(async { Ok(Value::string("done")) }))
        });
        let out = invoke("later", &f, CallConvention::Free, vec![]).await.unwrap();
        assert_eq!(out.as_str(), Some("done"));
    }

    #[tokio::test]
    async fn test_rejection_is_thrown() {
        let f = new_function("fail", 0, FunctionFlavor::Arrow, |_| {
            Ok(Value::promise(async { Err(Thrown::range_error("too big")) }))
        });
        match invoke("fail", &f, CallConvention::Free, vec![]).await {
            Err(Abort::Thrown(thrown)) => {
                assert_eq!(thrown.error_name(), Some(ErrorName::RangeError))
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_class_called_as_free_throws() {
        let class = counter_class();
        let err = invoke("Counter", &class, CallConvention::Free, vec![])
            .await
            .unwrap_err();
        assert!(matches!(err, Abort::Thrown(_)));
        assert!(matches!(
            invoke("x", &Value::Null, CallConvention::Free, vec![]).await,
            Err(Abort::Violation(_))
        ));
    }
}
