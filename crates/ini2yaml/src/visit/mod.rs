//! visitor pattern helpers
mod visit_values;
pub use visit_values::VisitValuesMut;

/// Visitor that may change what it visits
pub trait VisitMut<T> {
    fn visit_mut(&mut self, value: &mut T);
}

// closures are visitors
impl<T, F> VisitMut<T> for F
where
    F: FnMut(&mut T),
{
    fn visit_mut(&mut self, value: &mut T) {
        self(value)
    }
}
