use ordered_float::OrderedFloat;
use scryer_modular_bitfield::prelude::*;

use std::fmt;
use std::mem;

/// An interned constant. The index refers to an external symbol table the
/// execution core never inspects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Atom(pub u32);

/// An opaque index into the code area. The core stores and compares these
/// but never dereferences them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CodePtr(pub usize);

/// A functor name paired with its arity, packed into a single word so it can
/// serve both as a structure header cell and as a dispatch-table key.
#[bitfield]
#[repr(u64)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct FunctorArity {
    pub arity: B12,
    pub functor: B52,
}

impl FunctorArity {
    pub fn build_with(functor: Atom, arity: usize) -> Self {
        FunctorArity::new()
            .with_arity(arity as u16)
            .with_functor(functor.0 as u64)
    }

    #[inline]
    pub fn get_functor(self) -> Atom {
        Atom(self.functor() as u32)
    }

    #[inline]
    pub fn get_arity(self) -> usize {
        self.arity() as usize
    }

    #[inline]
    pub fn as_key(self) -> i64 {
        u64::from(self) as i64
    }
}

/// The address of a bindable cell, tagged with the region it lives in.
///
/// The derived ordering is total and doubles as an age order: every heap
/// cell is older than every local-stack cell, and within a region a lower
/// index is older. Binding always directs the younger variable at the older
/// one so that backtracking can never resurrect a dangling reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Addr {
    Heap(usize),
    Stack(usize),
}

impl Addr {
    #[inline]
    pub fn offset(self, n: usize) -> Addr {
        match self {
            Addr::Heap(h) => Addr::Heap(h + n),
            Addr::Stack(s) => Addr::Stack(s + n),
        }
    }

    #[inline]
    pub fn is_stack(self) -> bool {
        matches!(self, Addr::Stack(_))
    }
}

impl fmt::Display for Addr {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Addr::Heap(h) => write!(f, "H[{h}]"),
            Addr::Stack(s) => write!(f, "L[{s}]"),
        }
    }
}

/// The tag of a [`Word`], on its own.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Tag {
    Ref,
    Atm,
    Int,
    Flt,
    Lis,
    Stc,
    Fdv,
    Fun,
    F64,
}

/// A tagged machine word, the unit of both memory regions.
///
/// `Ref` is a reference to a bindable cell; a cell containing a `Ref` to its
/// own address is an unbound variable. `Flt`, `Lis` and `Stc` carry the heap
/// index of their payload: the boxed `F64` cell, the car (cdr at the next
/// cell), and the `Fun` header (arguments at the following cells). `Fdv` is
/// an opaque finite-domain variable handle owned by the external solver.
/// `Fun` and `F64` only ever appear inside heap payloads, never as operands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Word {
    Ref(Addr),
    Atm(Atom),
    Int(i64),
    Flt(usize),
    Lis(usize),
    Stc(usize),
    Fdv(usize),
    Fun(FunctorArity),
    F64(OrderedFloat<f64>),
}

// two machine words: the niched Addr discriminant folds into Word's own
const_assert!(mem::size_of::<Word>() == 16);

impl Word {
    #[inline]
    pub fn tag(self) -> Tag {
        match self {
            Word::Ref(_) => Tag::Ref,
            Word::Atm(_) => Tag::Atm,
            Word::Int(_) => Tag::Int,
            Word::Flt(_) => Tag::Flt,
            Word::Lis(_) => Tag::Lis,
            Word::Stc(_) => Tag::Stc,
            Word::Fdv(_) => Tag::Fdv,
            Word::Fun(_) => Tag::Fun,
            Word::F64(_) => Tag::F64,
        }
    }

    /// The address of a `Ref` word. Meaningful on a dereferenced word, where
    /// any remaining `Ref` is an unbound variable.
    #[inline]
    pub fn as_var(self) -> Option<Addr> {
        match self {
            Word::Ref(a) => Some(a),
            _ => None,
        }
    }

    /// An unbound variable cell for the given address.
    #[inline]
    pub fn unbound(a: Addr) -> Word {
        Word::Ref(a)
    }
}
