//! Function dictionary: stable ids for nested function literals.
//!
//! Compilation of one enclosing body registers every `Fun` node it meets
//! and emits a `LoadFun` naming the assigned id; the loader later walks
//! the dictionary in id order and materializes each entry into an
//! invocable function object.

use crate::bytecode::FunId;
use jasper_ast::FunLiteral;
use std::rc::Rc;

/// Append-only id assignment for the function literals of one compiled
/// unit.
#[derive(Debug, Default)]
pub struct FunDictionary {
    entries: Vec<Rc<FunLiteral>>,
}

impl FunDictionary {
    /// Create an empty dictionary.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a literal and return its id. Each syntactic `Fun` node is
    /// registered exactly once; ids are dense and start at zero.
    pub fn register(&mut self, fun: &Rc<FunLiteral>) -> FunId {
        let id = FunId::new(self.entries.len() as u32);
        self.entries.push(Rc::clone(fun));
        id
    }

    /// Look up a literal by id.
    #[must_use]
    pub fn get(&self, id: FunId) -> Option<&Rc<FunLiteral>> {
        self.entries.get(id.index())
    }

    /// Number of registered literals.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when no literal was registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate entries in id order.
    pub fn iter(&self) -> impl Iterator<Item = (FunId, &Rc<FunLiteral>)> {
        self.entries
            .iter()
            .enumerate()
            .map(|(i, fun)| (FunId::new(i as u32), fun))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jasper_ast::Block;

    fn literal(name: &str) -> Rc<FunLiteral> {
        Rc::new(FunLiteral {
            name: Some(name.to_owned()),
            params: vec![],
            body: Block::empty(1),
        })
    }

    #[test]
    fn test_ids_are_dense_and_ordered() {
        let mut dict = FunDictionary::new();
        let f = literal("f");
        let g = literal("g");
        assert_eq!(dict.register(&f), FunId::new(0));
        assert_eq!(dict.register(&g), FunId::new(1));
        assert_eq!(dict.len(), 2);

        let names: Vec<_> = dict
            .iter()
            .map(|(_, fun)| fun.display_name().to_owned())
            .collect();
        assert_eq!(names, ["f", "g"]);
    }

    #[test]
    fn test_get_shares_the_literal() {
        let mut dict = FunDictionary::new();
        let f = literal("f");
        let id = dict.register(&f);
        assert!(Rc::ptr_eq(dict.get(id).unwrap(), &f));
        assert!(dict.get(FunId::new(9)).is_none());
    }
}
