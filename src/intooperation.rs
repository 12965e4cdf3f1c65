use crate::Error;
use crate::ast::{Elements, Node, NumberType};
use std::iter::FusedIterator;
use std::marker::PhantomData;
use std::sync::Arc;

// Adapter layer that turns strongly-typed Rust functions into the erased
// `OperationFn` stored in the primitive registry. Primitives are written as
// plain functions over `i64`, `bool`, `Node` or a typed rest iterator; the
// adapters handle conversion, type errors and result wrapping.

/// Canonical erased primitive function type.
///
/// Primitives receive ownership of their already-evaluated arguments.
pub(crate) type OperationFn = dyn Fn(Vec<Node>) -> Result<Node, Error> + Send + Sync;

// =====================================================================
// Fixed-position parameters
// =====================================================================

/// Turns one evaluated argument into a strongly-typed parameter.
pub(crate) trait FromParam {
    type Param<'a>;

    fn from_arg<'a>(node: &'a mut Node) -> Result<Self::Param<'a>, Error>;
}

impl FromParam for Node {
    type Param<'a> = Node;

    fn from_arg<'a>(node: &'a mut Node) -> Result<Self::Param<'a>, Error> {
        Ok(std::mem::replace(node, Node::nil()))
    }
}

// Scalars convertible through `TryFrom<Node>` in `ast.rs`: `i64` and `bool`.
impl<T> FromParam for T
where
    Node: TryInto<T, Error = Error>,
{
    type Param<'a> = T;

    fn from_arg<'a>(node: &'a mut Node) -> Result<Self::Param<'a>, Error> {
        let owned = std::mem::replace(node, Node::nil());
        owned.try_into()
    }
}

// =====================================================================
// Typed iterators for rest parameters
// =====================================================================

/// Describes how a run of argument nodes is viewed by a rest parameter.
#[doc(hidden)]
pub trait NodeElementKind {
    type Item<'a>;

    /// Arguments that are proper lists contribute their elements instead of
    /// themselves, so `(sum (list 1 2) 3)` sees `1 2 3`.
    const FLATTEN_LISTS: bool;

    fn check(node: &Node) -> Result<(), Error>;
    fn project<'a>(node: &'a Node) -> Self::Item<'a>;
}

/// Iterator over a slice of evaluated arguments, typed by a
/// [`NodeElementKind`]. Every element is validated up front, so iteration
/// itself cannot fail.
#[doc(hidden)]
pub struct TypedNodeIter<'a, K: NodeElementKind> {
    args: std::slice::Iter<'a, Node>,
    nested: Option<Elements<'a>>,
    _marker: PhantomData<K>,
}

impl<'a, K> TypedNodeIter<'a, K>
where
    K: NodeElementKind,
{
    pub(crate) fn new(args: &'a [Node]) -> Result<Self, Error> {
        for arg in args {
            match arg {
                Node::Cons(_) if K::FLATTEN_LISTS => {
                    let items = arg.proper_list().ok_or_else(|| {
                        Error::TypeError(format!("expected a proper list, got {arg}"))
                    })?;
                    items.into_iter().try_for_each(K::check)?;
                }
                _ => K::check(arg)?,
            }
        }
        Ok(TypedNodeIter {
            args: args.iter(),
            nested: None,
            _marker: PhantomData,
        })
    }
}

impl<'a, K> Iterator for TypedNodeIter<'a, K>
where
    K: NodeElementKind,
{
    type Item = K::Item<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(nested) = &mut self.nested {
                if let Some(item) = nested.next() {
                    return Some(K::project(item));
                }
                self.nested = None;
            }

            let arg = self.args.next()?;
            if K::FLATTEN_LISTS && !arg.is_atom() {
                self.nested = Some(arg.elements());
                continue;
            }
            return Some(K::project(arg));
        }
    }
}

impl<'a, K> FusedIterator for TypedNodeIter<'a, K> where K: NodeElementKind {}

/// Raw argument nodes, no flattening.
#[doc(hidden)]
pub struct AnyKind;

impl NodeElementKind for AnyKind {
    type Item<'a> = &'a Node;
    const FLATTEN_LISTS: bool = false;

    fn check(_node: &Node) -> Result<(), Error> {
        Ok(())
    }

    fn project<'a>(node: &'a Node) -> Self::Item<'a> {
        node
    }
}

/// Integers, with list arguments flattened one level.
#[doc(hidden)]
pub struct NumberKind;

impl NodeElementKind for NumberKind {
    type Item<'a> = NumberType;
    const FLATTEN_LISTS: bool = true;

    fn check(node: &Node) -> Result<(), Error> {
        match node.as_atom() {
            Some(atom) if atom.is_numeric() => atom.as_int().map(|_| ()).ok_or_else(|| {
                Error::ArithmeticError(format!("integer literal {atom} is out of range"))
            }),
            _ => Err(Error::TypeError(format!("expected number, got {node}"))),
        }
    }

    fn project<'a>(node: &'a Node) -> Self::Item<'a> {
        debug_assert!(node.as_int().is_some(), "NumberKind saw a non-number after check");
        node.as_int().unwrap_or_default()
    }
}

/// Borrowed iterator over raw argument nodes.
pub type NodeIter<'a> = TypedNodeIter<'a, AnyKind>;

/// Borrowed iterator over numeric arguments, list arguments flattened.
pub type NumIter<'a> = TypedNodeIter<'a, NumberKind>;

// =====================================================================
// Rest-parameter support for variadic operations
// =====================================================================

pub(crate) trait FromRest {
    type Param<'a>;

    fn from_rest<'a>(slice: &'a [Node]) -> Result<Self::Param<'a>, Error>;
}

impl<K> FromRest for TypedNodeIter<'static, K>
where
    K: NodeElementKind,
{
    type Param<'a> = TypedNodeIter<'a, K>;

    fn from_rest<'a>(slice: &'a [Node]) -> Result<Self::Param<'a>, Error> {
        TypedNodeIter::<K>::new(slice)
    }
}

// =====================================================================
// Return-type adaptation
// =====================================================================

/// Normalizes primitive return types to `Result<Node, Error>`.
pub(crate) trait IntoNodeResult {
    fn into_node_result(self) -> Result<Node, Error>;
}

impl<T> IntoNodeResult for Result<T, Error>
where
    T: Into<Node>,
{
    fn into_node_result(self) -> Result<Node, Error> {
        self.map(Into::into)
    }
}

impl<T> IntoNodeResult for T
where
    T: Into<Node>,
{
    fn into_node_result(self) -> Result<Node, Error> {
        Ok(self.into())
    }
}

/// Converts a fixed-arity function into an [`OperationFn`]; `Args` is the
/// parameter tuple type.
pub(crate) trait IntoOperation<Args> {
    fn into_operation(self) -> Arc<OperationFn>;
}

/// Converts a function whose last parameter is a rest iterator into an
/// [`OperationFn`].
pub(crate) trait IntoVariadicOperation<Args> {
    fn into_variadic_operation(self) -> Arc<OperationFn>;
}

// =====================================================================
// Variadic adapters
// =====================================================================

impl<F, I, R> IntoVariadicOperation<(I,)> for F
where
    I: FromRest,
    F: for<'a> Fn(<I as FromRest>::Param<'a>) -> R + Send + Sync + 'static,
    R: IntoNodeResult,
{
    fn into_variadic_operation(self) -> Arc<OperationFn> {
        Arc::new(move |args: Vec<Node>| {
            let rest_param: <I as FromRest>::Param<'_> = <I as FromRest>::from_rest(&args[..])?;
            let result: R = (self)(rest_param);
            result.into_node_result()
        })
    }
}

macro_rules! impl_into_variadic_operation_for_prefix_and_rest {
    ($prefix:expr, $( $v:ident, $p:ident : $A:ident ),+ ) => {
        impl<F, I, R, $( $A ),+> IntoVariadicOperation<( $( $A, )+ I, )> for F
        where
            I: FromRest,
            $( $A: FromParam, )+
            F: for<'a> Fn(
                    $( <$A as FromParam>::Param<'a> ),+,
                    <I as FromRest>::Param<'a>,
                ) -> R
                + Send
                + Sync
                + 'static,
            R: IntoNodeResult,
        {
            fn into_variadic_operation(self) -> Arc<OperationFn> {
                Arc::new(move |mut args: Vec<Node>| {
                    let len = args.len();
                    match args.as_mut_slice() {
                        &mut [ $( ref mut $v ),+, ref mut rest @ .. ] => {
                            $(
                                let $p: <$A as FromParam>::Param<'_> =
                                    <$A as FromParam>::from_arg($v)?;
                            )+

                            let rest_param: <I as FromRest>::Param<'_> =
                                <I as FromRest>::from_rest(&*rest)?;

                            let result: R = (self)( $( $p ),+, rest_param );
                            result.into_node_result()
                        }
                        _ => Err(Error::arity_error("primitive", $prefix, len)),
                    }
                })
            }
        }
    };
}

impl_into_variadic_operation_for_prefix_and_rest!(1, v0, p0: A1);

// =====================================================================
// Fixed-arity adapters
// =====================================================================

macro_rules! impl_into_operation_for_arity {
    ($arity:expr, $( $v:ident, $p:ident : $A:ident ),+ ) => {
        impl<F, R, $( $A ),+> IntoOperation<( $( $A, )+ )> for F
        where
            F: for<'a> Fn( $( <$A as FromParam>::Param<'a> ),+ ) -> R
                + Send
                + Sync
                + 'static,
            $( $A: FromParam, )+
            R: IntoNodeResult,
        {
            fn into_operation(self) -> Arc<OperationFn> {
                Arc::new(move |mut args: Vec<Node>| {
                    let len = args.len();
                    match args.as_mut_slice() {
                        &mut [ $( ref mut $v ),+ ] => {
                            $(
                                let $p: <$A as FromParam>::Param<'_> =
                                    <$A as FromParam>::from_arg($v)?;
                            )+

                            let result: R = (self)( $( $p ),+ );
                            result.into_node_result()
                        }
                        _ => Err(Error::arity_error("primitive", $arity, len)),
                    }
                })
            }
        }
    };
}

impl<F, R> IntoOperation<()> for F
where
    F: Fn() -> R + Send + Sync + 'static,
    R: IntoNodeResult,
{
    fn into_operation(self) -> Arc<OperationFn> {
        Arc::new(move |args: Vec<Node>| {
            if !args.is_empty() {
                return Err(Error::arity_error("primitive", 0, args.len()));
            }

            let result: R = (self)();
            result.into_node_result()
        })
    }
}

impl_into_operation_for_arity!(1, v0, p0: A1);
impl_into_operation_for_arity!(2, v0, p0: A1, v1, p1: A2);

#[cfg(test)]
#[expect(clippy::unwrap_used)] // test code OK
mod tests {
    use super::*;
    use crate::ast::sym;

    fn nums(values: &[NumberType]) -> Vec<Node> {
        values.iter().copied().map(Node::from).collect()
    }

    #[test]
    fn test_num_iter_flattens_list_arguments() {
        let args = vec![
            Node::from(1),
            Node::list(nums(&[2, 3])),
            Node::from(4),
            Node::cons(Node::from(5), Node::from(6)),
        ];
        let collected: Vec<NumberType> = NumIter::new(&args[..3]).unwrap().collect();
        assert_eq!(collected, vec![1, 2, 3, 4]);
        assert!(NumIter::new(&args).is_err());
    }

    #[test]
    fn test_num_iter_rejects_bad_elements() {
        let cases = vec![
            vec![sym("x")],
            vec![Node::from(1), Node::list(vec![Node::from(2), sym("y")])],
            vec![Node::cons(Node::from(1), Node::from(2))],
        ];
        for (i, args) in cases.iter().enumerate() {
            assert!(
                matches!(NumIter::new(args), Err(Error::TypeError(_))),
                "case #{}",
                i + 1
            );
        }
    }

    #[test]
    fn test_node_iter_keeps_lists_whole() {
        let args = vec![Node::list(nums(&[1, 2])), sym("x")];
        let collected: Vec<&Node> = NodeIter::new(&args).unwrap().collect();
        assert_eq!(collected.len(), 2);
        assert_eq!(collected[0].to_string(), "(1 2)");
    }

    #[test]
    fn test_fixed_adapters() {
        fn add(a: NumberType, b: NumberType) -> NumberType {
            a + b
        }
        fn negate(b: bool) -> bool {
            !b
        }
        fn answer() -> NumberType {
            42
        }

        let op = <_ as IntoOperation<(NumberType, NumberType)>>::into_operation(add);
        assert_eq!(op(nums(&[7, 5])).unwrap(), Node::from(12));
        assert!(matches!(op(nums(&[7])), Err(Error::DefinitionError(_))));
        assert!(matches!(op(vec![sym("a"), Node::from(1)]), Err(Error::TypeError(_))));

        let op = <_ as IntoOperation<(bool,)>>::into_operation(negate);
        assert_eq!(op(vec![Node::t()]).unwrap(), Node::nil());
        assert!(matches!(op(nums(&[1])), Err(Error::TypeError(_))));

        let op = <_ as IntoOperation<()>>::into_operation(answer);
        assert_eq!(op(vec![]).unwrap(), Node::from(42));
        assert!(op(nums(&[1])).is_err());
    }

    #[test]
    fn test_variadic_adapters() {
        fn total(nums: NumIter<'_>) -> NumberType {
            nums.sum()
        }
        fn weighted(weight: NumberType, nums: NumIter<'_>) -> Result<NumberType, Error> {
            Ok(weight * nums.sum::<NumberType>())
        }

        let op = <_ as IntoVariadicOperation<(NumIter<'static>,)>>::into_variadic_operation(total);
        assert_eq!(op(nums(&[1, 2, 3])).unwrap(), Node::from(6));
        assert_eq!(op(vec![]).unwrap(), Node::from(0));

        let op = <_ as IntoVariadicOperation<(NumberType, NumIter<'static>)>>::into_variadic_operation(
            weighted,
        );
        assert_eq!(op(nums(&[2, 1, 2, 3])).unwrap(), Node::from(12));
        assert!(matches!(op(vec![]), Err(Error::DefinitionError(_))));
    }
}
