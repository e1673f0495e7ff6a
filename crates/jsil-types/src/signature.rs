//! Callable interfaces.
//!
//! A `Signature` describes the parameters and output of a callable. Parameter
//! kinds carry their callee-side widening rules: optional parameters widen to
//! `T ∨ undefined`, rest parameters collect into an array.

use crate::types::Type;
use smallvec::SmallVec;
use std::fmt;

/// One declared parameter of a callable.
#[derive(Debug, Clone, PartialEq)]
pub enum Parameter {
    /// A required parameter of the given type.
    Plain(Type),
    /// An optional parameter; on the callee side the binding may be `undefined`.
    Opt(Type),
    /// A rest parameter; on the callee side the binding is an array.
    Rest(Type),
}

impl Parameter {
    /// Whether a call site must supply an argument for this parameter.
    #[must_use]
    pub fn is_required(&self) -> bool {
        matches!(self, Parameter::Plain(_))
    }

    #[must_use]
    pub fn is_rest(&self) -> bool {
        matches!(self, Parameter::Rest(_))
    }

    /// The declared type, before any callee-side widening.
    #[must_use]
    pub fn declared_type(&self) -> &Type {
        match self {
            Parameter::Plain(t) | Parameter::Opt(t) | Parameter::Rest(t) => t,
        }
    }
}

/// A list of declared parameters, as passed to the analyzer ahead of a
/// subroutine definition.
pub type ParameterList = SmallVec<[Parameter; 4]>;

/// Parameters plus one output type: the interface of a callable.
#[derive(Debug, Clone, PartialEq)]
pub struct Signature {
    pub parameters: ParameterList,
    pub output: Type,
}

impl Signature {
    #[must_use]
    pub fn new(parameters: impl IntoIterator<Item = Parameter>, output: Type) -> Self {
        Self {
            parameters: parameters.into_iter().collect(),
            output,
        }
    }

    /// The signature accepting any arguments and returning `⊤`.
    #[must_use]
    pub fn universal() -> Self {
        Self::new([Parameter::Rest(Type::ANYTHING)], Type::ANYTHING)
    }

    /// A copy of this signature with a different output type.
    #[must_use]
    pub fn with_output(&self, output: Type) -> Self {
        Self {
            parameters: self.parameters.clone(),
            output,
        }
    }

    #[must_use]
    pub fn num_parameters(&self) -> usize {
        self.parameters.len()
    }

    /// Number of parameters a call site must supply.
    #[must_use]
    pub fn num_required_parameters(&self) -> usize {
        self.parameters.iter().filter(|p| p.is_required()).count()
    }

    #[must_use]
    pub fn has_rest_parameter(&self) -> bool {
        self.parameters.last().is_some_and(Parameter::is_rest)
    }

    /// Whether a call with `n` arguments fits this signature's arity.
    ///
    /// Optional parameters may be omitted; a rest parameter absorbs any
    /// number of surplus arguments.
    #[must_use]
    pub fn accepts_argument_count(&self, n: usize) -> bool {
        if n < self.num_required_parameters() {
            return false;
        }
        if self.has_rest_parameter() {
            return true;
        }
        n <= self.num_parameters()
    }
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[")?;
        for (i, p) in self.parameters.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            match p {
                Parameter::Plain(t) => write!(f, "{t}")?,
                Parameter::Opt(t) => write!(f, "opt {t}")?,
                Parameter::Rest(t) => write!(f, "{t}...")?,
            }
        }
        write!(f, "] => {}", self.output)
    }
}
