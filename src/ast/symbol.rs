use std::cell::RefCell;
use std::rc::Rc;

use crate::typecheck::types::Type;

/// What kind of binding this declaration introduces; distinguishes a
/// function value (which gets a function-table index during codegen)
/// from an ordinary local/parameter (which gets a stack slot instead).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SymbolKind {
    Variable,
    Parameter,
    Function,
}

/// A named declaration shared between its declaration site and every use
/// site. The symbol pass creates one of these per `var`/parameter/function
/// name and every `Ident`/assignment node stores an `Rc` to it rather than
/// copying the name or type around — mirrors the shared type-slot pattern
/// `why_lib`'s typechecker scope uses for variable bindings.
#[derive(Debug)]
pub struct SymbolDecl {
    pub name: String,
    pub kind: SymbolKind,
    /// Filled in by the type pass (declared or inferred).
    pub ty: RefCell<Option<Type>>,
    /// Local slot assigned by codegen, for `Variable`/`Parameter` kinds.
    pub slot: RefCell<Option<u8>>,
    /// Function-table index assigned by codegen, for `Function` kind.
    pub func_index: RefCell<Option<u8>>,
}

impl SymbolDecl {
    pub fn new(name: impl Into<String>, kind: SymbolKind) -> Rc<Self> {
        Rc::new(Self {
            name: name.into(),
            kind,
            ty: RefCell::new(None),
            slot: RefCell::new(None),
            func_index: RefCell::new(None),
        })
    }

    pub fn ty(&self) -> Option<Type> {
        self.ty.borrow().clone()
    }

    pub fn set_ty(&self, ty: Type) {
        *self.ty.borrow_mut() = Some(ty);
    }
}

pub type SymbolRef = Rc<SymbolDecl>;
