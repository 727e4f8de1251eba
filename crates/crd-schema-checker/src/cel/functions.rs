//! Signatures and cost functions of the function library available to
//! validation rules.
//!
//! This covers the CEL standard library together with the extension libraries
//! the Kubernetes API server installs for CRD validation rules (strings, lists,
//! regex, URLs, quantities, IPs and CIDRs).

use crate::cel::{
    cost::{CostEstimate, REGEX_STRING_LENGTH_COST_FACTOR, scaled, traversal_cost},
    types::{Kind, Type},
};

const URL: &str = "kubernetes.URL";
const QUANTITY: &str = "kubernetes.Quantity";
const IP: &str = "net.IP";
const CIDR: &str = "net.CIDR";

/// Longest string representation of a number, e.g. `-9223372036854775808`.
const MAX_NUMBER_STRING_SIZE: u64 = 32;

/// A resolved call: the type of its result and the cost of the call itself,
/// excluding the cost of evaluating its arguments.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Overload {
    pub result: Type,
    pub cost: CostEstimate,
}

impl Overload {
    fn new(result: Type, cost: u64) -> Self {
        Self {
            result,
            cost: CostEstimate::fixed(cost),
        }
    }

    fn unit(result: Type) -> Self {
        Self::new(result, 1)
    }
}

/// Resolves a call of `function` on `target` (or a global call if `target` is
/// [`None`]) with the given argument types.
///
/// Returns [`None`] if no overload matches.
pub fn resolve(function: &str, target: Option<&Type>, args: &[Type]) -> Option<Overload> {
    match target {
        None => global(function, args),
        Some(target) if target.is_dyn() => dynamic_receiver(function, target, args),
        Some(target) => receiver(function, target, args),
    }
}

fn is(ty: &Type, kind: &Kind) -> bool {
    ty.is_dyn() || ty.kind == *kind
}

fn is_string(ty: &Type) -> bool {
    is(ty, &Kind::String)
}

fn is_int(ty: &Type) -> bool {
    is(ty, &Kind::Int)
}

fn is_opaque(ty: &Type, name: &str) -> bool {
    ty.is_dyn() || matches!(ty.kind, Kind::Opaque(opaque) if opaque == name)
}

fn global(function: &str, args: &[Type]) -> Option<Overload> {
    let overload = match (function, args) {
        ("size", [arg]) if arg.is_sized() || arg.is_dyn() => Overload::unit(Type::INT),

        ("int", [arg]) if matches!(
            arg.kind,
            Kind::Dyn | Kind::Int | Kind::Uint | Kind::Double | Kind::String | Kind::Timestamp
        ) =>
        {
            Overload::unit(Type::INT)
        }
        ("uint", [arg]) if arg.is_numeric() || is_string(arg) => Overload::unit(Type::UINT),
        ("double", [arg]) if arg.is_numeric() || is_string(arg) => Overload::unit(Type::DOUBLE),
        ("bool", [arg]) if is(arg, &Kind::Bool) || is_string(arg) => Overload::unit(Type::BOOL),
        ("string", [arg]) => string_conversion(arg)?,
        ("bytes", [arg]) if is_string(arg) || is(arg, &Kind::Bytes) => Overload::new(
            Type::bytes(arg.max_size),
            traversed(arg.max_size),
        ),
        ("duration", [arg]) if is_string(arg) || is(arg, &Kind::Duration) => {
            Overload::unit(Type::DURATION)
        }
        ("timestamp", [arg])
            if is_string(arg) || is(arg, &Kind::Timestamp) || is_int(arg) =>
        {
            Overload::unit(Type::TIMESTAMP)
        }
        ("dyn", [arg]) => Overload::unit(Type::DYN.with_max_size(arg.max_size)),
        ("type", [_]) => Overload::unit(Type::TYPE),

        ("matches", [string, regex]) => {
            return resolve("matches", Some(string), std::slice::from_ref(regex));
        }

        ("url", [arg]) if is_string(arg) => Overload::new(
            Type::opaque(URL).with_max_size(arg.max_size),
            traversed(arg.max_size),
        ),
        ("quantity", [arg]) if is_string(arg) => Overload::new(
            Type::opaque(QUANTITY),
            traversed(arg.max_size),
        ),
        ("ip", [arg]) if is_string(arg) => {
            Overload::new(Type::opaque(IP), traversed(arg.max_size))
        }
        ("cidr", [arg]) if is_string(arg) => {
            Overload::new(Type::opaque(CIDR), traversed(arg.max_size))
        }
        ("isURL" | "isQuantity" | "isIP" | "isCIDR", [arg]) if is_string(arg) => {
            Overload::new(Type::BOOL, traversed(arg.max_size))
        }
        ("ip.isCanonical", [arg]) if is_string(arg) => {
            Overload::new(Type::BOOL, traversed(arg.max_size))
        }

        ("optional.of" | "optional.ofNonZeroValue", [arg]) => {
            Overload::unit(Type::optional(arg.clone()))
        }
        ("optional.none", []) => Overload::unit(Type::optional(Type::DYN)),

        _ => return None,
    };

    Some(overload)
}

fn string_conversion(arg: &Type) -> Option<Overload> {
    let overload = match arg.kind {
        Kind::String | Kind::Dyn => Overload::unit(arg.clone()),
        Kind::Bytes => Overload::new(Type::string(arg.max_size), traversed(arg.max_size)),
        Kind::Int | Kind::Uint | Kind::Double | Kind::Bool => {
            Overload::unit(Type::string(MAX_NUMBER_STRING_SIZE))
        }
        Kind::Timestamp | Kind::Duration => Overload::unit(Type::string(arg.max_size.max(64))),
        _ => return None,
    };

    Some(overload)
}

/// Resolves a receiver call on a value whose type is only known at runtime by
/// trying every receiver type that could support `function`.
fn dynamic_receiver(function: &str, target: &Type, args: &[Type]) -> Option<Overload> {
    let size = target.max_size;
    let candidates = [
        Type::string(size),
        Type::list(Type::DYN, size),
        Type::map(Type::DYN, Type::DYN, size),
        Type::TIMESTAMP,
        Type::optional(Type::DYN),
    ];

    candidates
        .iter()
        .find_map(|candidate| receiver(function, candidate, args))
}

fn receiver(function: &str, target: &Type, args: &[Type]) -> Option<Overload> {
    if function == "size" && args.is_empty() {
        return global("size", std::slice::from_ref(target));
    }

    match &target.kind {
        Kind::String => string_receiver(function, target, args),
        Kind::List(element) => list_receiver(function, target, element, args),
        Kind::Timestamp | Kind::Duration => time_receiver(function, target, args),
        Kind::Optional(inner) => optional_receiver(function, inner, args),
        Kind::Opaque(URL) => url_receiver(function, target, args),
        Kind::Opaque(QUANTITY) => quantity_receiver(function, args),
        Kind::Opaque(IP) => ip_receiver(function, args),
        Kind::Opaque(CIDR) => cidr_receiver(function, args),
        _ => None,
    }
}

fn string_receiver(function: &str, target: &Type, args: &[Type]) -> Option<Overload> {
    let size = target.max_size;
    let traversal = traversed(size);

    let overload = match (function, args) {
        ("contains" | "startsWith" | "endsWith", [arg]) if is_string(arg) => {
            Overload::new(Type::BOOL, traversal)
        }
        ("matches", [regex]) if is_string(regex) => {
            Overload::new(Type::BOOL, regex_cost(size, regex.max_size))
        }
        ("find", [regex]) if is_string(regex) => {
            Overload::new(Type::string(size), regex_cost(size, regex.max_size))
        }
        ("findAll", [regex] | [regex, _]) if is_string(regex) && args.get(1).is_none_or(is_int) => {
            Overload::new(
                Type::list(Type::string(size), size),
                regex_cost(size, regex.max_size),
            )
        }
        ("charAt", [index]) if is_int(index) => Overload::new(Type::string(1), traversal),
        ("indexOf" | "lastIndexOf", [arg] | [arg, _])
            if is_string(arg) && args.get(1).is_none_or(is_int) =>
        {
            Overload::new(Type::INT, traversal)
        }
        ("lowerAscii" | "upperAscii" | "trim" | "reverse", []) => {
            Overload::new(Type::string(size), traversal)
        }
        ("substring", [start] | [start, _]) if is_int(start) && args.get(1).is_none_or(is_int) => {
            Overload::new(Type::string(size), traversal)
        }
        ("replace", [from, to] | [from, to, _])
            if is_string(from) && is_string(to) && args.get(2).is_none_or(is_int) =>
        {
            let result_size = size.saturating_mul(to.max_size.max(1));
            Overload::new(Type::string(result_size), traversed(result_size))
        }
        ("split", [separator] | [separator, _])
            if is_string(separator) && args.get(1).is_none_or(is_int) =>
        {
            Overload::new(Type::list(Type::string(size), size), traversal)
        }
        _ => return None,
    };

    Some(overload)
}

/// Cost of a call which traverses a string of `size` bytes once.
fn traversed(size: u64) -> u64 {
    traversal_cost(size).saturating_add(1)
}

/// Matching traverses the string once per character of the pattern.
fn regex_cost(string_size: u64, regex_size: u64) -> u64 {
    traversal_cost(string_size)
        .saturating_mul(scaled(regex_size, REGEX_STRING_LENGTH_COST_FACTOR))
        .max(1)
}

fn list_receiver(function: &str, target: &Type, element: &Type, args: &[Type]) -> Option<Overload> {
    let size = target.max_size;
    let traversal = 1u64.saturating_add(size);

    let overload = match (function, args) {
        ("join", [] | [_]) if is_string(element) && args.first().is_none_or(is_string) => {
            let separator = args.first().map_or(0, |separator| separator.max_size);
            let result_size = size.saturating_mul(element.max_size.saturating_add(separator));
            Overload::new(Type::string(result_size), traversed(result_size))
        }
        ("isSorted", []) if element.is_orderable() => Overload::new(Type::BOOL, traversal),
        ("sum", []) if element.is_numeric() || element.is_dyn() => {
            Overload::new(element.clone(), traversal)
        }
        ("min" | "max", []) if element.is_orderable() => Overload::new(element.clone(), traversal),
        ("indexOf" | "lastIndexOf", [arg]) if arg.is_comparable_with(element) => {
            Overload::new(Type::INT, traversal)
        }
        _ => return None,
    };

    Some(overload)
}

fn time_receiver(function: &str, target: &Type, args: &[Type]) -> Option<Overload> {
    let timestamp = target.kind == Kind::Timestamp;
    let timezone = match args {
        [] => true,
        [timezone] => timestamp && is_string(timezone),
        _ => false,
    };
    if !timezone {
        return None;
    }

    match function {
        "getHours" | "getMinutes" | "getSeconds" | "getMilliseconds" => {
            Some(Overload::unit(Type::INT))
        }
        "getFullYear" | "getMonth" | "getDayOfYear" | "getDayOfMonth" | "getDate"
        | "getDayOfWeek"
            if timestamp =>
        {
            Some(Overload::unit(Type::INT))
        }
        _ => None,
    }
}

fn optional_receiver(function: &str, inner: &Type, args: &[Type]) -> Option<Overload> {
    let overload = match (function, args) {
        ("hasValue", []) => Overload::unit(Type::BOOL),
        ("value", []) => Overload::unit(inner.clone()),
        ("orValue", [fallback]) if fallback.is_assignable_to(inner) => {
            Overload::unit(inner.join(fallback))
        }
        ("or", [other]) if matches!(other.kind, Kind::Optional(_) | Kind::Dyn) => {
            Overload::unit(Type::optional(inner.clone()))
        }
        _ => return None,
    };

    Some(overload)
}

fn url_receiver(function: &str, target: &Type, args: &[Type]) -> Option<Overload> {
    if !args.is_empty() {
        return None;
    }

    let component = Type::string(target.max_size);
    let overload = match function {
        "getScheme" | "getHost" | "getHostname" | "getPort" | "getEscapedPath" => {
            Overload::unit(component)
        }
        "getQuery" => Overload::unit(Type::map(
            component.clone(),
            Type::list(component, target.max_size),
            target.max_size,
        )),
        _ => return None,
    };

    Some(overload)
}

fn quantity_receiver(function: &str, args: &[Type]) -> Option<Overload> {
    let is_quantity = |ty: &Type| is_opaque(ty, QUANTITY);

    let overload = match (function, args) {
        ("sign" | "asInteger", []) => Overload::unit(Type::INT),
        ("isInteger", []) => Overload::unit(Type::BOOL),
        ("asApproximateFloat", []) => Overload::unit(Type::DOUBLE),
        ("add" | "sub", [arg]) if is_quantity(arg) || is_int(arg) => {
            Overload::unit(Type::opaque(QUANTITY))
        }
        ("isLessThan" | "isGreaterThan", [arg]) if is_quantity(arg) => {
            Overload::unit(Type::BOOL)
        }
        ("compareTo", [arg]) if is_quantity(arg) => Overload::unit(Type::INT),
        _ => return None,
    };

    Some(overload)
}

fn ip_receiver(function: &str, args: &[Type]) -> Option<Overload> {
    if !args.is_empty() {
        return None;
    }

    let overload = match function {
        "family" => Overload::unit(Type::INT),
        "isUnspecified" | "isLoopback" | "isLinkLocalMulticast" | "isLinkLocalUnicast"
        | "isGlobalUnicast" => Overload::unit(Type::BOOL),
        _ => return None,
    };

    Some(overload)
}

fn cidr_receiver(function: &str, args: &[Type]) -> Option<Overload> {
    let overload = match (function, args) {
        ("containsIP", [arg]) if is_opaque(arg, IP) || is_string(arg) => {
            Overload::unit(Type::BOOL)
        }
        ("containsCIDR", [arg]) if is_opaque(arg, CIDR) || is_string(arg) => {
            Overload::unit(Type::BOOL)
        }
        ("ip", []) => Overload::unit(Type::opaque(IP)),
        ("masked", []) => Overload::unit(Type::opaque(CIDR)),
        ("prefixLength", []) => Overload::unit(Type::INT),
        _ => return None,
    };

    Some(overload)
}
