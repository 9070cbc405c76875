//! Function-traits helper (C6).
//!
//! The source material uses compile-time templates to pull a callable's
//! argument and return types out of plain functions, function pointers,
//! and functor objects, so that `Node<K, F>` can validate at compile
//! time that slot-argument types match upstream output types without
//! the caller repeating them. Rust has no variadic templates; the
//! idiomatic replacement is a small family of trait impls over tuples,
//! generated once by a declarative macro — the same technique the
//! standard library itself uses for `Fn`/`FnMut`/`FnOnce` over tuples of
//! arguments, and the shape `itertools`/`nom`-style crates use for
//! arity-indexed combinators.
//!
//! [`NodeFn`] is implemented for every `F: Fn(Args...) -> O` up to the
//! arities the engine's node structs need (0 through 4 dependencies).
//! Node construction is generic over `F`, so the compiler infers `Args`
//! and `Output` from the closure or function pointer passed in — no
//! type annotation burden on the caller.

/// A callable whose argument tuple and output type are known at compile
/// time. Implemented for plain `fn` items, function pointers, and
/// (capturing or not) closures via the blanket impls below.
pub trait NodeFn<Args>: Send + Sync {
    type Output;
    fn call(&self, args: Args) -> Self::Output;
}

macro_rules! impl_node_fn {
    ( $( $arg:ident ),* ) => {
        impl<F, O, $( $arg ),*> NodeFn<( $( $arg, )* )> for F
        where
            F: Fn( $( $arg ),* ) -> O + Send + Sync,
        {
            type Output = O;

            #[inline]
            #[allow(non_snake_case)]
            fn call(&self, args: ( $( $arg, )* )) -> O {
                let ( $( $arg, )* ) = args;
                (self)( $( $arg ),* )
            }
        }
    };
}

impl_node_fn!();
impl_node_fn!(A);
impl_node_fn!(A, B);
impl_node_fn!(A, B, C);
impl_node_fn!(A, B, C, D);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn arity_zero() {
        let f = || 7i32;
        assert_eq!(NodeFn::call(&f, ()), 7);
    }

    #[test]
    fn arity_one() {
        let f = |a: i32| a + 1;
        assert_eq!(NodeFn::call(&f, (41,)), 42);
    }

    #[test]
    fn arity_two_heterogeneous_args() {
        let f = |a: i32, b: f64| a as f64 + b;
        assert_eq!(NodeFn::call(&f, (3, 0.5)), 3.5);
    }

    #[test]
    fn capturing_closure() {
        let offset = 10i32;
        let f = move |a: i32| a + offset;
        assert_eq!(NodeFn::call(&f, (5,)), 15);
    }
}
