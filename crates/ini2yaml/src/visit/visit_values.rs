use super::VisitMut;
use crate::value::Value;
use indexmap::IndexMap;

/// Recursively visit the leaves of a value mutably
///
/// Arrays are descended into, every other value is handed to the visitor.
pub trait VisitValuesMut {
    fn visit_values_mut(&mut self, visitor: &mut dyn VisitMut<Value>);

    /// Only visit [Value::Reference]s
    fn visit_references_mut(&mut self, visitor: &mut dyn VisitMut<Value>) {
        self.visit_values_mut(&mut |value: &mut Value| {
            if matches!(value, Value::Reference(_)) {
                visitor.visit_mut(value);
            }
        });
    }

    /// Only visit [Value::Shared]s
    fn visit_shared_mut(&mut self, visitor: &mut dyn VisitMut<Value>) {
        self.visit_values_mut(&mut |value: &mut Value| {
            if matches!(value, Value::Shared(_)) {
                visitor.visit_mut(value);
            }
        });
    }
}

impl VisitValuesMut for Value {
    fn visit_values_mut(&mut self, visitor: &mut dyn VisitMut<Value>) {
        match self {
            Value::Array(array) => {
                for value in array {
                    value.visit_values_mut(visitor);
                }
            }
            _ => visitor.visit_mut(self),
        }
    }
}

impl VisitValuesMut for IndexMap<String, Value> {
    fn visit_values_mut(&mut self, visitor: &mut dyn VisitMut<Value>) {
        for value in self.values_mut() {
            value.visit_values_mut(visitor);
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::path::Path;
    use pretty_assertions::assert_eq;

    #[test]
    fn references_inside_arrays_are_visited() {
        let mut value = Value::Array(vec![
            Value::Integer(1),
            Value::Array(vec![Value::Reference(Path::parse("globalVars.a"))]),
        ]);

        value.visit_references_mut(&mut |v: &mut Value| {
            if let Value::Reference(path) = v {
                *v = Value::Deferred(path.clone());
            }
        });

        assert_eq!(
            value,
            Value::Array(vec![
                Value::Integer(1),
                Value::Array(vec![Value::Deferred(Path::parse("globalVars.a"))]),
            ])
        );
    }

    #[test]
    fn only_matching_leaves_are_visited() {
        let mut record: IndexMap<String, Value> = [
            ("a".to_string(), Value::Integer(1)),
            ("b".to_string(), Value::string("x")),
        ]
        .into_iter()
        .collect();

        let mut count = 0;
        record.visit_shared_mut(&mut |_: &mut Value| count += 1);
        assert_eq!(count, 0);

        record.visit_values_mut(&mut |_: &mut Value| count += 1);
        assert_eq!(count, 2);
    }
}
