//! Type checking and static cost estimation of parsed expressions.
//!
//! Both happen in a single bottom-up pass: every node is assigned its type,
//! the size bound of its values and the `[min, max]` cost of evaluating it,
//! including all of its children.

use crate::cel::{
    ast::{BinaryOp, Expr, ExprKind, Literal, Macro, UnaryOp},
    cost::{
        CONST_COST, CostEstimate, LIST_CREATE_BASE_COST, MAP_CREATE_BASE_COST,
        SELECT_AND_IDENT_COST, traversal_cost,
    },
    functions::{self, Overload},
    types::{Kind, Type},
};

/// Per iteration overhead of `all` and `exists`: the loop condition and
/// accumulating the result.
const PREDICATE_ITERATION_COST: u64 = 3;

/// Per iteration overhead of `exists_one`, which can't short-circuit.
const COUNTING_ITERATION_COST: u64 = 2;

/// Per iteration overhead of `map` and `filter`, which append to a new list.
const LIST_BUILDING_ITERATION_COST: u64 = 12;

const SELF: &str = "self";
const OLD_SELF: &str = "oldSelf";

/// Functions which take a regular expression as their last argument.
const REGEX_FUNCTIONS: &[&str] = &["matches", "find", "findAll"];

/// The variables available to an expression.
#[derive(Clone, Debug)]
pub struct Env {
    pub self_type: Type,

    /// The type of `oldSelf`, if transition rules are allowed.
    pub old_self_type: Option<Type>,
}

/// The outcome of checking an expression.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Checked {
    pub ty: Type,
    pub cost: CostEstimate,
}

impl Checked {
    fn new(ty: Type, cost: CostEstimate) -> Self {
        Self { ty, cost }
    }
}

/// A type error, located by the byte offset of the offending expression.
#[derive(Debug, PartialEq, Eq)]
pub struct CheckError {
    pub message: String,
    pub offset: usize,
}

type Result<T, E = CheckError> = std::result::Result<T, E>;

/// The result of checking a whole expression.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CheckedExpr {
    pub ty: Type,
    pub cost: CostEstimate,
    pub uses_old_self: bool,
}

/// Checks `expr` against `env`.
pub fn check(expr: &Expr, env: &Env) -> Result<CheckedExpr> {
    let mut checker = Checker {
        env,
        scopes: Vec::new(),
        uses_old_self: false,
    };

    let checked = checker.check(expr)?;

    Ok(CheckedExpr {
        ty: checked.ty,
        cost: checked.cost,
        uses_old_self: checker.uses_old_self,
    })
}

struct Checker<'e> {
    env: &'e Env,

    /// Comprehension variables, innermost last.
    scopes: Vec<(String, Type)>,

    uses_old_self: bool,
}

fn error<T>(offset: usize, message: impl Into<String>) -> Result<T> {
    Err(CheckError {
        message: message.into(),
        offset,
    })
}

fn no_matching_overload<T>(offset: usize, function: &str, args: &[&Type]) -> Result<T> {
    let args = args
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ");

    error(
        offset,
        format!("found no matching overload for '{function}' applied to '({args})'"),
    )
}

fn is_bool(ty: &Type) -> bool {
    matches!(ty.kind, Kind::Bool | Kind::Dyn)
}

impl Checker<'_> {
    fn check(&mut self, expr: &Expr) -> Result<Checked> {
        let offset = expr.offset;

        match &expr.kind {
            ExprKind::Literal(literal) => Ok(Checked::new(
                literal_type(literal),
                CostEstimate::fixed(CONST_COST),
            )),
            ExprKind::Ident(name) => {
                let Some(ty) = self.lookup(name) else {
                    return error(
                        offset,
                        format!("undeclared reference to '{name}' (in container '')"),
                    );
                };
                Ok(Checked::new(ty, CostEstimate::fixed(SELECT_AND_IDENT_COST)))
            }
            ExprKind::Select {
                operand,
                field,
                optional,
            } => {
                let operand = self.check(operand)?;
                let ty = select(&operand.ty, field, *optional, offset)?;
                Ok(Checked::new(ty, operand.cost.add_fixed(SELECT_AND_IDENT_COST)))
            }
            ExprKind::Has { operand, field } => {
                let operand = self.check(operand)?;
                select(&operand.ty, field, false, offset)?;
                Ok(Checked::new(
                    Type::BOOL,
                    operand.cost.add_fixed(SELECT_AND_IDENT_COST),
                ))
            }
            ExprKind::Index {
                operand,
                index,
                optional,
            } => self.check_index(operand, index, *optional, offset),
            ExprKind::Call {
                target,
                function,
                args,
            } => self.check_call(target.as_deref(), function, args, offset),
            ExprKind::Unary { op, operand } => {
                let operand = self.check(operand)?;
                let valid = match op {
                    UnaryOp::Not => is_bool(&operand.ty),
                    UnaryOp::Negate => {
                        matches!(operand.ty.kind, Kind::Int | Kind::Double | Kind::Dyn)
                    }
                };
                if !valid {
                    let function = match op {
                        UnaryOp::Not => "!_",
                        UnaryOp::Negate => "-_",
                    };
                    return no_matching_overload(offset, function, &[&operand.ty]);
                }
                Ok(Checked::new(operand.ty, operand.cost.add_fixed(1)))
            }
            ExprKind::Binary { op, lhs, rhs } => {
                let lhs = self.check(lhs)?;
                let rhs = self.check(rhs)?;
                binary(*op, &lhs, &rhs, offset)
            }
            ExprKind::Conditional {
                condition,
                then,
                otherwise,
            } => {
                let condition = self.check(condition)?;
                let then = self.check(then)?;
                let otherwise = self.check(otherwise)?;

                if !is_bool(&condition.ty) {
                    return no_matching_overload(
                        offset,
                        "_?_:_",
                        &[&condition.ty, &then.ty, &otherwise.ty],
                    );
                }

                Ok(Checked::new(
                    then.ty.join(&otherwise.ty),
                    condition.cost.add(then.cost.union(otherwise.cost)),
                ))
            }
            ExprKind::List(elements) => {
                let mut element_type: Option<Type> = None;
                let mut cost = CostEstimate::fixed(LIST_CREATE_BASE_COST);

                for element in elements {
                    let element = self.check(element)?;
                    cost = cost.add(element.cost);
                    element_type = Some(match element_type {
                        Some(ty) => ty.join(&element.ty),
                        None => element.ty,
                    });
                }

                let ty = Type::list(
                    element_type.unwrap_or(Type::DYN),
                    elements.len() as u64,
                );
                Ok(Checked::new(ty, cost))
            }
            ExprKind::Map(entries) => {
                let mut key_type: Option<Type> = None;
                let mut value_type: Option<Type> = None;
                let mut cost = CostEstimate::fixed(MAP_CREATE_BASE_COST);

                for (key, value) in entries {
                    let key_offset = key.offset;
                    let key = self.check(key)?;
                    let value = self.check(value)?;

                    if !key.ty.is_valid_map_key() {
                        return error(
                            key_offset,
                            format!("unsupported map key type: {}", key.ty),
                        );
                    }

                    cost = cost.add(key.cost).add(value.cost);
                    key_type = Some(match key_type {
                        Some(ty) => ty.join(&key.ty),
                        None => key.ty,
                    });
                    value_type = Some(match value_type {
                        Some(ty) => ty.join(&value.ty),
                        None => value.ty,
                    });
                }

                let ty = Type::map(
                    key_type.unwrap_or(Type::DYN),
                    value_type.unwrap_or(Type::DYN),
                    entries.len() as u64,
                );
                Ok(Checked::new(ty, cost))
            }
            ExprKind::Comprehension {
                kind,
                range,
                variable,
                step,
                transform,
            } => self.check_comprehension(*kind, range, variable, step, transform.as_deref(), offset),
        }
    }

    fn lookup(&mut self, name: &str) -> Option<Type> {
        if let Some((_, ty)) = self.scopes.iter().rev().find(|(variable, _)| variable == name) {
            return Some(ty.clone());
        }

        match name {
            SELF => Some(self.env.self_type.clone()),
            OLD_SELF => {
                let ty = self.env.old_self_type.clone()?;
                self.uses_old_self = true;
                Some(ty)
            }
            _ => None,
        }
    }

    fn is_declared(&self, name: &str) -> bool {
        self.scopes.iter().any(|(variable, _)| variable == name)
            || name == SELF
            || (name == OLD_SELF && self.env.old_self_type.is_some())
    }

    fn check_index(
        &mut self,
        operand: &Expr,
        index: &Expr,
        optional: bool,
        offset: usize,
    ) -> Result<Checked> {
        let operand = self.check(operand)?;
        let index = self.check(index)?;
        let cost = operand.cost.add(index.cost).add_fixed(1);

        let (container, chained) = match &operand.ty.kind {
            Kind::Optional(inner) => (inner.as_ref(), true),
            _ => (&operand.ty, false),
        };

        let element = match &container.kind {
            Kind::Dyn => Type::DYN,
            Kind::List(element)
                if matches!(index.ty.kind, Kind::Int | Kind::Uint | Kind::Dyn) =>
            {
                element.as_ref().clone()
            }
            Kind::Map(key, value) if index.ty.is_assignable_to(key) => value.as_ref().clone(),
            _ => return no_matching_overload(offset, "_[_]", &[&operand.ty, &index.ty]),
        };

        let ty = if optional || chained {
            Type::optional(element)
        } else {
            element
        };

        Ok(Checked::new(ty, cost))
    }

    fn check_call(
        &mut self,
        target: Option<&Expr>,
        function: &str,
        args: &[Expr],
        offset: usize,
    ) -> Result<Checked> {
        // Namespaced functions like `optional.of(x)` parse as receiver calls on
        // an identifier which isn't a variable.
        let (target, function) = match target {
            Some(Expr {
                kind: ExprKind::Ident(namespace),
                ..
            }) if !self.is_declared(namespace) => (None, format!("{namespace}.{function}")),
            target => (target, function.to_owned()),
        };

        if REGEX_FUNCTIONS.contains(&function.as_str()) {
            if let Some(Expr {
                kind: ExprKind::Literal(Literal::String(pattern)),
                offset,
            }) = args.last()
            {
                if let Err(regex_error) = regex::Regex::new(pattern) {
                    return error(
                        *offset,
                        format!("invalid regular expression {pattern:?}: {regex_error}"),
                    );
                }
            }
        }

        let mut cost = CostEstimate::ZERO;

        let target = match target {
            Some(target) => {
                let target = self.check(target)?;
                cost = cost.add(target.cost);
                Some(target.ty)
            }
            None => None,
        };

        let mut arg_types = Vec::with_capacity(args.len());
        for arg in args {
            let arg = self.check(arg)?;
            cost = cost.add(arg.cost);
            arg_types.push(arg.ty);
        }

        let Some(Overload {
            result,
            cost: call_cost,
        }) = functions::resolve(&function, target.as_ref(), &arg_types)
        else {
            let args = arg_types
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join(", ");
            let receiver = target
                .as_ref()
                .map(|target| format!("{target}."))
                .unwrap_or_default();

            return error(
                offset,
                format!("found no matching overload for '{function}' applied to '{receiver}({args})'"),
            );
        };

        Ok(Checked::new(result, cost.add(call_cost)))
    }

    fn check_comprehension(
        &mut self,
        kind: Macro,
        range: &Expr,
        variable: &str,
        step: &Expr,
        transform: Option<&Expr>,
        offset: usize,
    ) -> Result<Checked> {
        let range = self.check(range)?;

        let variable_type = match &range.ty.kind {
            Kind::List(element) => element.as_ref().clone(),
            Kind::Map(key, _) => key.as_ref().clone(),
            Kind::Dyn => Type::DYN,
            _ => {
                return error(
                    offset,
                    format!(
                        "expression of type '{}' cannot be range of a comprehension (must be list, map, or dynamic)",
                        range.ty
                    ),
                );
            }
        };
        let iterations = range.ty.max_size;

        self.scopes.push((variable.to_owned(), variable_type.clone()));
        let body = self.check_comprehension_body(kind, variable_type, step, transform, iterations);
        self.scopes.pop();
        let (result, iteration_cost) = body?;

        let overhead = match kind {
            Macro::All | Macro::Exists => PREDICATE_ITERATION_COST,
            Macro::ExistsOne => COUNTING_ITERATION_COST,
            Macro::Map | Macro::MapFilter | Macro::Filter => LIST_BUILDING_ITERATION_COST,
        };

        let loop_cost = iteration_cost.add_fixed(overhead).multiply(iterations);
        let cost = CostEstimate::new(range.cost.min, range.cost.max.saturating_add(loop_cost.max));

        Ok(Checked::new(result, cost))
    }

    /// Checks the body of a comprehension, returning the result type and the
    /// cost of a single iteration.
    fn check_comprehension_body(
        &mut self,
        kind: Macro,
        variable_type: Type,
        step: &Expr,
        transform: Option<&Expr>,
        iterations: u64,
    ) -> Result<(Type, CostEstimate)> {
        let step_offset = step.offset;
        let step = self.check(step)?;

        let requires_bool = !matches!(kind, Macro::Map);
        if requires_bool && !is_bool(&step.ty) {
            return error(
                step_offset,
                format!(
                    "{kind}() predicate must evaluate to a bool, got '{}'",
                    step.ty
                ),
            );
        }

        let checked = match (kind, transform) {
            (Macro::All | Macro::Exists | Macro::ExistsOne, _) => (Type::BOOL, step.cost),
            (Macro::Filter, _) => (Type::list(variable_type, iterations), step.cost),
            (Macro::Map, _) => (Type::list(step.ty, iterations), step.cost),
            (Macro::MapFilter, Some(transform)) => {
                let transform = self.check(transform)?;
                (
                    Type::list(transform.ty, iterations),
                    step.cost.add(transform.cost),
                )
            }
            (Macro::MapFilter, None) => return error(step_offset, "map() requires a transform"),
        };

        Ok(checked)
    }
}

fn literal_type(literal: &Literal) -> Type {
    match literal {
        Literal::Null => Type::NULL,
        Literal::Bool(_) => Type::BOOL,
        Literal::Int(_) => Type::INT,
        Literal::Uint(_) => Type::UINT,
        Literal::Double(_) => Type::DOUBLE,
        Literal::String(value) => Type::string(value.len() as u64),
        Literal::Bytes(value) => Type::bytes(value.len() as u64),
    }
}

/// Returns the type of `operand.field`, or `operand.?field` if `optional` is
/// set. Selecting on an optional value yields an optional value.
fn select(operand: &Type, field: &str, optional: bool, offset: usize) -> Result<Type> {
    let (container, chained) = match &operand.kind {
        Kind::Optional(inner) => (inner.as_ref(), true),
        _ => (operand, false),
    };

    let ty = match &container.kind {
        Kind::Object(fields) => match fields.get(field) {
            Some(ty) => ty.clone(),
            None => return error(offset, format!("undefined field '{field}'")),
        },
        Kind::Map(_, value) => value.as_ref().clone(),
        Kind::Dyn => Type::DYN.with_max_size(container.max_size),
        _ => {
            return error(
                offset,
                format!("type '{container}' does not support field selection"),
            );
        }
    };

    Ok(if optional || chained {
        Type::optional(ty)
    } else {
        ty
    })
}

fn binary(op: BinaryOp, lhs: &Checked, rhs: &Checked, offset: usize) -> Result<Checked> {
    let operands = lhs.cost.add(rhs.cost);
    let (l, r) = (&lhs.ty, &rhs.ty);

    let (ty, cost) = match op {
        BinaryOp::And | BinaryOp::Or => {
            if !is_bool(l) || !is_bool(r) {
                return no_matching_overload(offset, &op.to_string(), &[l, r]);
            }
            // The right hand side is skipped if the left one decides the result.
            let cost = CostEstimate::new(lhs.cost.min, lhs.cost.max.saturating_add(rhs.cost.max));
            return Ok(Checked::new(Type::BOOL, cost));
        }
        BinaryOp::Equals | BinaryOp::NotEquals => {
            if !l.is_comparable_with(r) {
                return no_matching_overload(offset, &op.to_string(), &[l, r]);
            }
            (Type::BOOL, comparison_cost(l, r))
        }
        BinaryOp::Less | BinaryOp::LessEquals | BinaryOp::Greater | BinaryOp::GreaterEquals => {
            let same_kind = l.is_assignable_to(r) || (l.is_numeric() && r.is_numeric());
            if !l.is_orderable() || !r.is_orderable() || !same_kind {
                return no_matching_overload(offset, &op.to_string(), &[l, r]);
            }
            (Type::BOOL, comparison_cost(l, r))
        }
        BinaryOp::In => {
            let cost = match &r.kind {
                Kind::List(element) if l.is_comparable_with(element) => {
                    r.max_size.saturating_add(1)
                }
                Kind::Map(key, _) if l.is_comparable_with(key) => 1,
                Kind::Dyn => 1,
                _ => return no_matching_overload(offset, &op.to_string(), &[l, r]),
            };
            (Type::BOOL, cost)
        }
        BinaryOp::Add
        | BinaryOp::Subtract
        | BinaryOp::Multiply
        | BinaryOp::Divide
        | BinaryOp::Modulo => match arithmetic(op, l, r) {
            Some(result) => result,
            None => return no_matching_overload(offset, &op.to_string(), &[l, r]),
        },
    };

    Ok(Checked::new(ty, operands.add_fixed(cost)))
}

/// Comparing strings or bytes traverses the shorter operand.
fn comparison_cost(lhs: &Type, rhs: &Type) -> u64 {
    match (&lhs.kind, &rhs.kind) {
        (Kind::String, Kind::String) | (Kind::Bytes, Kind::Bytes) => {
            traversal_cost(lhs.max_size.min(rhs.max_size)).saturating_add(1)
        }
        _ => 1,
    }
}

/// Resolves an arithmetic operator, returning the result type and the cost of
/// the operation itself.
fn arithmetic(op: BinaryOp, lhs: &Type, rhs: &Type) -> Option<(Type, u64)> {
    use Kind::{Bytes, Double, Duration, Dyn, Int, List, String, Timestamp, Uint};

    let result = match (op, &lhs.kind, &rhs.kind) {
        (_, Dyn, Dyn) => Type::DYN,
        (_, Dyn, _) => rhs.clone(),
        (_, _, Dyn) => lhs.clone(),

        (_, Int, Int) | (_, Uint, Uint) => lhs.clone(),
        (BinaryOp::Modulo, ..) => return None,
        (_, Double, Double) => lhs.clone(),

        (BinaryOp::Add, String, String) | (BinaryOp::Add, Bytes, Bytes) => {
            let size = lhs.max_size.saturating_add(rhs.max_size);
            let result = lhs.clone().with_max_size(size);
            return Some((result, traversal_cost(size).max(1)));
        }
        (BinaryOp::Add, List(a), List(b)) => {
            let size = lhs.max_size.saturating_add(rhs.max_size);
            return Some((Type::list(a.join(b), size), 1));
        }

        (BinaryOp::Add, Timestamp, Duration) | (BinaryOp::Add, Duration, Timestamp) => {
            Type::TIMESTAMP
        }
        (BinaryOp::Subtract, Timestamp, Duration) => Type::TIMESTAMP,
        (BinaryOp::Subtract, Timestamp, Timestamp) => Type::DURATION,
        (BinaryOp::Add | BinaryOp::Subtract, Duration, Duration) => Type::DURATION,

        _ => return None,
    };

    Some((result, 1))
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;
    use crate::cel::parser::parse;

    fn env(self_type: Type) -> Env {
        Env {
            old_self_type: Some(self_type.clone()),
            self_type,
        }
    }

    fn check_str(input: &str, env: &Env) -> Result<CheckedExpr> {
        let expr = parse(input).expect("expression must parse");
        check(&expr, env)
    }

    fn list_of_ints() -> Type {
        Type::list(Type::INT, 10)
    }

    #[rstest]
    #[case("self.size() <= 10", 3)]
    #[case("size(self) <= 10", 3)]
    #[case("self.all(x, x > 0)", 51)]
    #[case("self.exists_one(x, x == 1)", 41)]
    #[case("self.map(x, x * 2).size() > 0", 1 + 10 * (2 + 12) + 1 + 1)]
    #[case("self.filter(x, x > 0).size() > 0", 1 + 10 * (2 + 12) + 1 + 1)]
    #[case("1 in self", 12)]
    #[case("[1, 2, 3].size() == 3", 12)]
    #[case("true", 0)]
    fn costs_on_lists(#[case] input: &str, #[case] expected: u64) {
        let checked = check_str(input, &env(list_of_ints())).expect("expression must check");
        assert_eq!(checked.cost.max, expected, "{input}");
        assert_eq!(checked.ty, Type::BOOL);
    }

    #[test]
    fn logical_operators_can_short_circuit() {
        let checked = check_str("self.size() > 0 || self.all(x, x > 0)", &env(list_of_ints()))
            .expect("expression must check");
        assert_eq!(checked.cost, CostEstimate::new(3, 3 + 51));
    }

    #[test]
    fn nested_comprehensions_multiply() {
        let ty = Type::list(Type::list(Type::string(10), 5), 4);
        let checked = check_str("self.all(l, l.all(s, s.startsWith('a')))", &env(ty))
            .expect("expression must check");

        // s.startsWith('a'): ident + 1 + ceil(10 * 0.1)
        let inner = 1 + 5 * (3 + 3);
        assert_eq!(checked.cost.max, 1 + 4 * (inner + 3));
    }

    #[test]
    fn unbounded_costs_saturate() {
        let ty = Type::list(Type::string(u64::MAX), u64::MAX);
        let checked = check_str("self.all(s, s.contains('x'))", &env(ty)).expect("expression must check");
        assert_eq!(checked.cost.max, u64::MAX);
    }

    #[test]
    fn object_fields() {
        let ty = Type::object(
            [("name".to_owned(), Type::string(20)), ("replicas".to_owned(), Type::INT)]
                .into_iter()
                .collect(),
        );

        let checked = check_str("self.name == 'foo' && self.replicas > 1", &env(ty.clone()))
            .expect("expression must check");
        assert_eq!(checked.ty, Type::BOOL);
        assert!(!checked.uses_old_self);

        let checked = check_str("self.replicas >= oldSelf.replicas", &env(ty.clone()))
            .expect("expression must check");
        assert!(checked.uses_old_self);

        let error = check_str("self.foo == 1", &env(ty)).expect_err("field is undefined");
        assert_eq!(error.message, "undefined field 'foo'");
        assert_eq!(error.offset, 4);
    }

    #[test]
    fn optional_old_self() {
        let env = Env {
            self_type: Type::INT,
            old_self_type: Some(Type::optional(Type::INT)),
        };

        check_str("oldSelf.hasValue() && self >= oldSelf.value()", &env).expect("expression must check");
        check_str("self >= oldSelf.orValue(0)", &env).expect("expression must check");
        check_str("self >= oldSelf", &env).expect_err("optional can't be compared with int");
    }

    #[rstest]
    #[case("self + 'a'", "found no matching overload for '_+_' applied to '(int, string)'")]
    #[case("foo > 1", "undeclared reference to 'foo' (in container '')")]
    #[case("self.startsWith('a')", "found no matching overload for 'startsWith' applied to 'int.(string)'")]
    #[case("size(self)", "found no matching overload for 'size' applied to '(int)'")]
    #[case("'abc'.matches('[')", "invalid regular expression \"[\"")]
    #[case("self.all(x, true)", "expression of type 'int' cannot be range of a comprehension")]
    fn type_errors(#[case] input: &str, #[case] expected: &str) {
        let error = check_str(input, &env(Type::INT)).expect_err("expression must not check");
        assert!(
            error.message.starts_with(expected),
            "{:?} does not start with {expected:?}",
            error.message
        );
    }

    #[test]
    fn regex_cost() {
        let checked = check_str("self.matches('^[a-z]+$')", &env(Type::string(100)))
            .expect("expression must check");
        // ident + ceil(100 * 0.1) * ceil(8 * 0.25)
        assert_eq!(checked.cost.max, 1 + 10 * 2);
    }

    #[test]
    fn namespaced_functions() {
        let checked = check_str("optional.of(self).hasValue()", &env(Type::INT))
            .expect("expression must check");
        assert_eq!(checked.ty, Type::BOOL);

        let checked = check_str("url(self).getHost() == 'example.com'", &env(Type::string(100)))
            .expect("expression must check");
        assert_eq!(checked.ty, Type::BOOL);
    }

    #[test]
    fn maps_and_conditionals() {
        let ty = Type::map(Type::string(10), Type::INT, 3);

        let checked = check_str("'a' in self ? self['a'] > 0 : self.all(k, k != 'b')", &env(ty))
            .expect("expression must check");
        assert_eq!(checked.ty, Type::BOOL);

        // `'a' in self` + max(self['a'] > 0, all)
        let all = 1 + 3 * (1 + 2 + 3);
        assert_eq!(checked.cost.max, 2 + all);
    }
}
