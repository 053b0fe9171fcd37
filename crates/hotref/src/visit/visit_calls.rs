use super::Visit;
use crate::value::{Intrinsic, Value};

/// Recursively visit all [Intrinsic] calls
///
/// Arguments of a call are not visited, resolving a call takes care of its nested calls.
pub trait VisitCalls {
    fn visit_calls(&self, visitor: &mut dyn Visit<Intrinsic>);
}

impl VisitCalls for Value {
    fn visit_calls(&self, visitor: &mut dyn Visit<Intrinsic>) {
        match self {
            Value::Call(call) => visitor.visit(call),
            Value::Array(array) => {
                for value in array {
                    value.visit_calls(visitor);
                }
            }
            Value::Object(object) => {
                for value in object.values() {
                    value.visit_calls(visitor);
                }
            }
            _ => {}
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn finds_calls_in_nested_structures() {
        let value: Value = serde_yaml::from_str::<serde_yaml::Value>(
            r#"
            properties:
              image: {get_param: image}
              networks:
                - port: {get_resource: port}
                - fixed_ip: {get_attr: [port, fixed_ips, 0, {get_param: key}]}
              user_data:
                str_replace:
                  template: $a
                  params: {$a: {get_param: a}}
            "#,
        )
        .unwrap()
        .into();

        let mut names = vec![];
        value.visit_calls(&mut |call: &Intrinsic| names.push(call.function_name()));

        assert_eq!(
            names,
            vec!["get_param", "get_resource", "get_attr", "get_param"]
        );
    }
}
