//! The opcode set.
//!
//! Every operation declares its operand shape (number of inputs, outputs,
//! and inner outputs), whether it is guarded, and whether it executes in
//! Wasm context. The analyzer's dispatcher is a case analysis over this
//! enum; the shapes let `Instruction::new` validate operand lists up front.

use jsil_types::{Type, WasmAbstractHeapType, WasmSignature};

// =============================================================================
// JS operator payloads
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOperator {
    PreInc,
    PreDec,
    PostInc,
    PostDec,
    LogicalNot,
    BitwiseNot,
    Minus,
    Plus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOperator {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Exp,
    BitAnd,
    BitOr,
    Xor,
    LShift,
    RShift,
    UnsignedRShift,
    LogicAnd,
    LogicOr,
    NullCoalesce,
}

impl BinaryOperator {
    /// Whether this operator short-circuits and yields one of its operands.
    #[must_use]
    pub fn is_logical(self) -> bool {
        matches!(
            self,
            BinaryOperator::LogicAnd | BinaryOperator::LogicOr | BinaryOperator::NullCoalesce
        )
    }

    /// Whether this operator works on the bit representation.
    #[must_use]
    pub fn is_bitwise(self) -> bool {
        matches!(
            self,
            BinaryOperator::BitAnd
                | BinaryOperator::BitOr
                | BinaryOperator::Xor
                | BinaryOperator::LShift
                | BinaryOperator::RShift
                | BinaryOperator::UnsignedRShift
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparator {
    Equal,
    StrictEqual,
    NotEqual,
    StrictNotEqual,
    LessThan,
    LessThanOrEqual,
    GreaterThan,
    GreaterThanOrEqual,
}

/// Shape of a subroutine's declared parameters: a slot count plus whether
/// the final slot is a rest parameter. Declared parameter *types* are not
/// part of the IR; they reach the analyzer through `set_parameters`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubroutineParameters {
    pub count: usize,
    pub has_rest: bool,
}

impl SubroutineParameters {
    #[must_use]
    pub fn simple(count: usize) -> Self {
        Self {
            count,
            has_rest: false,
        }
    }
}

// =============================================================================
// Wasm operator payloads
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WasmIntegerBinaryOperator {
    Add,
    Sub,
    Mul,
    DivS,
    DivU,
    RemS,
    RemU,
    And,
    Or,
    Xor,
    Shl,
    ShrS,
    ShrU,
    Rotl,
    Rotr,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WasmIntegerUnaryOperator {
    Clz,
    Ctz,
    Popcnt,
    /// Comparison against zero; always yields `i32`.
    Eqz,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WasmIntegerCompareOperator {
    Eq,
    Ne,
    LtS,
    LtU,
    GtS,
    GtU,
    LeS,
    LeU,
    GeS,
    GeU,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WasmFloatBinaryOperator {
    Add,
    Sub,
    Mul,
    Div,
    Min,
    Max,
    CopySign,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WasmFloatUnaryOperator {
    Abs,
    Neg,
    Ceil,
    Floor,
    Trunc,
    Nearest,
    Sqrt,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WasmFloatCompareOperator {
    Eq,
    Ne,
    Lt,
    Gt,
    Le,
    Ge,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WasmMemoryLoadKind {
    I32Load,
    I64Load,
    F32Load,
    F64Load,
    I32Load8S,
    I32Load8U,
    I32Load16S,
    I32Load16U,
    I64Load8S,
    I64Load8U,
    I64Load16S,
    I64Load16U,
    I64Load32S,
    I64Load32U,
}

impl WasmMemoryLoadKind {
    /// The value type this load produces.
    #[must_use]
    pub fn value_type(self) -> Type {
        match self {
            WasmMemoryLoadKind::I32Load
            | WasmMemoryLoadKind::I32Load8S
            | WasmMemoryLoadKind::I32Load8U
            | WasmMemoryLoadKind::I32Load16S
            | WasmMemoryLoadKind::I32Load16U => Type::WASM_I32,
            WasmMemoryLoadKind::I64Load
            | WasmMemoryLoadKind::I64Load8S
            | WasmMemoryLoadKind::I64Load8U
            | WasmMemoryLoadKind::I64Load16S
            | WasmMemoryLoadKind::I64Load16U
            | WasmMemoryLoadKind::I64Load32S
            | WasmMemoryLoadKind::I64Load32U => Type::WASM_I64,
            WasmMemoryLoadKind::F32Load => Type::WASM_F32,
            WasmMemoryLoadKind::F64Load => Type::WASM_F64,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WasmMemoryStoreKind {
    I32Store,
    I64Store,
    F32Store,
    F64Store,
    I32Store8,
    I32Store16,
    I64Store8,
    I64Store16,
    I64Store32,
}

/// A storage-type operand of a Wasm type definition: either a plain value
/// type, or an indexed reference whose target is the type-definition
/// variable at the given input slot.
#[derive(Debug, Clone, PartialEq)]
pub enum WasmTypeRefOperand {
    Value(Type),
    TypeIndex { input: usize, nullable: bool },
}

impl WasmTypeRefOperand {
    fn input_slot(&self) -> Option<usize> {
        match self {
            WasmTypeRefOperand::Value(_) => None,
            WasmTypeRefOperand::TypeIndex { input, .. } => Some(*input),
        }
    }
}

/// One field of a struct type definition.
#[derive(Debug, Clone, PartialEq)]
pub struct WasmStructField {
    pub ty: WasmTypeRefOperand,
    pub mutable: bool,
}

/// One catch clause of a try_table block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WasmCatchKind {
    /// Catch a specific tag; consumes one tag input.
    Tag,
    /// Catch a specific tag and capture the exception reference.
    TagRef,
    /// Catch everything.
    All,
    /// Catch everything and capture the exception reference.
    AllRef,
}

impl WasmCatchKind {
    fn consumes_tag(self) -> bool {
        matches!(self, WasmCatchKind::Tag | WasmCatchKind::TagRef)
    }
}

fn num_type_inputs<'a>(operands: impl Iterator<Item = &'a WasmTypeRefOperand>) -> usize {
    operands
        .filter_map(WasmTypeRefOperand::input_slot)
        .map(|slot| slot + 1)
        .max()
        .unwrap_or(0)
}

// =============================================================================
// The operation enum
// =============================================================================

#[derive(Debug, Clone, PartialEq)]
pub enum Operation {
    // --- constant loads ---
    LoadInteger { value: i64 },
    LoadFloat { value: f64 },
    LoadBigInt { value: i64 },
    LoadString { value: String, name: Option<String> },
    LoadBoolean { value: bool },
    LoadUndefined,
    LoadNull,
    LoadThis,
    LoadArguments,
    LoadRegExp { pattern: String, flags: String },
    LoadNewTarget,
    LoadBuiltin { name: String },

    // --- arrays and templates ---
    CreateArray { num_initial_values: usize },
    CreateIntArray { values: Vec<i64> },
    CreateFloatArray { values: Vec<f64> },
    CreateTemplateString { parts: Vec<String> },

    // --- object literals ---
    BeginObjectLiteral,
    ObjectLiteralAddProperty { name: String },
    ObjectLiteralAddComputedProperty,
    ObjectLiteralCopyProperties,
    BeginObjectLiteralMethod { name: String, parameters: SubroutineParameters },
    EndObjectLiteralMethod,
    BeginObjectLiteralComputedMethod { parameters: SubroutineParameters },
    EndObjectLiteralComputedMethod,
    BeginObjectLiteralGetter { name: String },
    EndObjectLiteralGetter,
    BeginObjectLiteralSetter { name: String },
    EndObjectLiteralSetter,
    EndObjectLiteral,

    // --- classes ---
    BeginClassDefinition { has_superclass: bool },
    ClassAddInstanceProperty { name: String, has_value: bool },
    ClassAddStaticProperty { name: String, has_value: bool },
    BeginClassConstructor { parameters: SubroutineParameters },
    EndClassConstructor,
    BeginClassInstanceMethod { name: String, parameters: SubroutineParameters },
    EndClassInstanceMethod,
    BeginClassInstanceGetter { name: String },
    EndClassInstanceGetter,
    BeginClassInstanceSetter { name: String },
    EndClassInstanceSetter,
    BeginClassStaticMethod { name: String, parameters: SubroutineParameters },
    EndClassStaticMethod,
    BeginClassStaticGetter { name: String },
    EndClassStaticGetter,
    BeginClassStaticSetter { name: String },
    EndClassStaticSetter,
    EndClassDefinition,

    // --- property and element access ---
    GetProperty { name: String, is_guarded: bool },
    SetProperty { name: String },
    UpdateProperty { name: String, op: BinaryOperator },
    DeleteProperty { name: String, is_guarded: bool },
    GetElement { index: i64, is_guarded: bool },
    SetElement { index: i64 },
    GetComputedProperty { is_guarded: bool },
    SetComputedProperty,
    DeleteComputedProperty { is_guarded: bool },
    GetSuperProperty { name: String },
    SetSuperProperty { name: String },

    // --- destructuring ---
    DestructArray { indices: Vec<i64>, last_is_rest: bool },
    DestructArrayAndReassign { indices: Vec<i64>, last_is_rest: bool },
    DestructObject { properties: Vec<String>, has_rest_element: bool },
    DestructObjectAndReassign { properties: Vec<String>, has_rest_element: bool },

    // --- calls ---
    CallFunction { num_arguments: usize, is_guarded: bool },
    Construct { num_arguments: usize, is_guarded: bool },
    CallMethod { name: String, num_arguments: usize, is_guarded: bool },
    CallComputedMethod { num_arguments: usize, is_guarded: bool },
    CallSuperConstructor { num_arguments: usize },
    CallSuperMethod { name: String, num_arguments: usize },

    // --- operators ---
    UnaryOperation { op: UnaryOperator },
    BinaryOperation { op: BinaryOperator },
    Compare { op: Comparator },
    TernaryOperation,
    TypeOf,
    InstanceOf,
    In,
    VoidOperation,
    Dup,
    Reassign,
    Await,
    Yield { has_argument: bool },
    YieldEach,
    ThrowException,

    // --- conditional control flow ---
    BeginIf { inverted: bool },
    BeginElse,
    EndIf,
    BeginSwitch,
    BeginSwitchCase,
    BeginSwitchDefaultCase,
    EndSwitchCase,
    EndSwitch,

    // --- loops ---
    BeginWhileLoopHeader,
    BeginWhileLoopBody,
    EndWhileLoop,
    BeginDoWhileLoopBody,
    BeginDoWhileLoopHeader,
    EndDoWhileLoop,
    BeginForLoopInitializer,
    BeginForLoopCondition { num_loop_variables: usize },
    BeginForLoopAfterthought { num_loop_variables: usize },
    BeginForLoopBody { num_loop_variables: usize },
    EndForLoop,
    BeginForInLoop,
    EndForInLoop,
    BeginForOfLoop,
    BeginForOfLoopWithDestruct { indices: Vec<i64>, has_rest_element: bool },
    EndForOfLoop,
    BeginRepeatLoop { iterations: u64, exposes_loop_counter: bool },
    EndRepeatLoop,
    LoopBreak,
    LoopContinue,

    // --- blocks and exception handling ---
    BeginBlockStatement,
    EndBlockStatement,
    BeginTry,
    BeginCatch,
    BeginFinally,
    EndTryCatchFinally,

    // --- subroutines ---
    BeginPlainFunction { parameters: SubroutineParameters },
    EndPlainFunction,
    BeginArrowFunction { parameters: SubroutineParameters },
    EndArrowFunction,
    BeginGeneratorFunction { parameters: SubroutineParameters },
    EndGeneratorFunction,
    BeginAsyncFunction { parameters: SubroutineParameters },
    EndAsyncFunction,
    BeginAsyncArrowFunction { parameters: SubroutineParameters },
    EndAsyncArrowFunction,
    BeginAsyncGeneratorFunction { parameters: SubroutineParameters },
    EndAsyncGeneratorFunction,
    Return { has_value: bool },

    // --- Wasm objects created from JS ---
    CreateWasmGlobal { value_type: Type, mutable: bool },
    CreateWasmTable { element_type: Type },
    CreateWasmMemory { is_memory64: bool, is_shared: bool },
    CreateWasmJsTag { parameters: Vec<Type> },

    // --- Wasm modules and functions ---
    BeginWasmModule,
    EndWasmModule,
    BeginWasmFunction { signature: WasmSignature },
    EndWasmFunction,
    WasmReturn { num_values: usize },
    WasmJsCall { signature: WasmSignature },
    WasmCallDirect { signature: WasmSignature },
    WasmCallIndirect { signature: WasmSignature },

    // --- Wasm type groups ---
    WasmBeginTypeGroup,
    WasmEndTypeGroup,
    WasmDefineSignatureType {
        parameters: Vec<WasmTypeRefOperand>,
        results: Vec<WasmTypeRefOperand>,
    },
    WasmDefineArrayType { element: WasmTypeRefOperand, mutable: bool },
    WasmDefineStructType { fields: Vec<WasmStructField> },
    WasmDefineForwardOrSelfReference,
    WasmResolveForwardReference,

    // --- Wasm constants and numeric operators ---
    WasmConsti32 { value: i32 },
    WasmConsti64 { value: i64 },
    WasmConstf32 { value: f32 },
    WasmConstf64 { value: f64 },
    WasmConstSimd128 { value: [u8; 16] },
    WasmI32BinOp { op: WasmIntegerBinaryOperator },
    WasmI64BinOp { op: WasmIntegerBinaryOperator },
    WasmF32BinOp { op: WasmFloatBinaryOperator },
    WasmF64BinOp { op: WasmFloatBinaryOperator },
    WasmI32UnOp { op: WasmIntegerUnaryOperator },
    WasmI64UnOp { op: WasmIntegerUnaryOperator },
    WasmF32UnOp { op: WasmFloatUnaryOperator },
    WasmF64UnOp { op: WasmFloatUnaryOperator },
    WasmI32CompareOp { op: WasmIntegerCompareOperator },
    WasmI64CompareOp { op: WasmIntegerCompareOperator },
    WasmF32CompareOp { op: WasmFloatCompareOperator },
    WasmF64CompareOp { op: WasmFloatCompareOperator },
    WasmWrapI64ToI32,
    WasmExtendI32ToI64 { signed: bool },
    WasmSelect,
    WasmUnreachable,

    // --- Wasm reference operations ---
    WasmRefNull { heap: Option<WasmAbstractHeapType> },
    WasmRefIsNull,
    WasmRefFunc,
    WasmRefI31,
    WasmI31Get { signed: bool },
    WasmStructNew { num_field_values: usize },
    WasmStructNewDefault,
    WasmStructGet { field_index: usize },
    WasmStructSet { field_index: usize },
    WasmArrayNewFixed { num_elements: usize },
    WasmArrayNewDefault,
    WasmArrayLen,
    WasmArrayGet { signed: bool },
    WasmArraySet,

    // --- Wasm globals, tables, memories, tags ---
    WasmDefineGlobal { value_type: Type, mutable: bool },
    WasmGlobalGet,
    WasmGlobalSet,
    WasmDefineTable { element_type: Type },
    WasmTableGet,
    WasmTableSet,
    WasmDefineMemory { is_memory64: bool, is_shared: bool },
    WasmMemoryLoad { kind: WasmMemoryLoadKind },
    WasmMemoryStore { kind: WasmMemoryStoreKind },
    WasmDefineTag { parameters: Vec<Type> },
    WasmThrow { num_arguments: usize },
    WasmRethrow,

    // --- Wasm structured control flow ---
    WasmBeginBlock { signature: WasmSignature },
    WasmEndBlock { num_results: usize },
    WasmBeginIf { signature: WasmSignature, inverted: bool },
    WasmBeginElse { signature: WasmSignature },
    WasmEndIf { num_results: usize },
    WasmBeginLoop { signature: WasmSignature },
    WasmEndLoop { num_results: usize },
    WasmBeginTry { signature: WasmSignature },
    WasmBeginCatch { num_tag_parameters: usize },
    WasmBeginCatchAll,
    WasmEndTry { num_results: usize },
    WasmBeginTryTable { signature: WasmSignature, catches: Vec<WasmCatchKind> },
    WasmEndTryTable { num_results: usize },
    WasmBeginTryDelegate { signature: WasmSignature },
    WasmEndTryDelegate { num_results: usize },
    WasmBranch { num_arguments: usize },
    WasmBranchIf { num_arguments: usize },
}

impl Operation {
    /// The operand shape: (inputs, outputs, inner outputs).
    #[must_use]
    pub fn shape(&self) -> (usize, usize, usize) {
        use Operation::*;
        match self {
            LoadInteger { .. } | LoadFloat { .. } | LoadBigInt { .. } | LoadString { .. }
            | LoadBoolean { .. } | LoadUndefined | LoadNull | LoadThis | LoadArguments
            | LoadRegExp { .. } | LoadNewTarget | LoadBuiltin { .. } => (0, 1, 0),

            CreateArray { num_initial_values } => (*num_initial_values, 1, 0),
            CreateIntArray { .. } | CreateFloatArray { .. } => (0, 1, 0),
            CreateTemplateString { parts } => (parts.len().saturating_sub(1), 1, 0),

            BeginObjectLiteral => (0, 0, 0),
            ObjectLiteralAddProperty { .. } => (1, 0, 0),
            ObjectLiteralAddComputedProperty => (2, 0, 0),
            ObjectLiteralCopyProperties => (1, 0, 0),
            BeginObjectLiteralMethod { parameters, .. } => (0, 0, 1 + parameters.count),
            BeginObjectLiteralComputedMethod { parameters } => (1, 0, 1 + parameters.count),
            BeginObjectLiteralGetter { .. } => (0, 0, 1),
            BeginObjectLiteralSetter { .. } => (0, 0, 2),
            EndObjectLiteralMethod
            | EndObjectLiteralComputedMethod
            | EndObjectLiteralGetter
            | EndObjectLiteralSetter => (0, 0, 0),
            EndObjectLiteral => (0, 1, 0),

            BeginClassDefinition { has_superclass } => (usize::from(*has_superclass), 1, 0),
            ClassAddInstanceProperty { has_value, .. }
            | ClassAddStaticProperty { has_value, .. } => (usize::from(*has_value), 0, 0),
            BeginClassConstructor { parameters }
            | BeginClassInstanceMethod { parameters, .. }
            | BeginClassStaticMethod { parameters, .. } => (0, 0, 1 + parameters.count),
            BeginClassInstanceGetter { .. } | BeginClassStaticGetter { .. } => (0, 0, 1),
            BeginClassInstanceSetter { .. } | BeginClassStaticSetter { .. } => (0, 0, 2),
            EndClassConstructor
            | EndClassInstanceMethod
            | EndClassInstanceGetter
            | EndClassInstanceSetter
            | EndClassStaticMethod
            | EndClassStaticGetter
            | EndClassStaticSetter
            | EndClassDefinition => (0, 0, 0),

            GetProperty { .. } => (1, 1, 0),
            SetProperty { .. } | UpdateProperty { .. } => (2, 0, 0),
            DeleteProperty { .. } => (1, 1, 0),
            GetElement { .. } => (1, 1, 0),
            SetElement { .. } => (2, 0, 0),
            GetComputedProperty { .. } => (2, 1, 0),
            SetComputedProperty => (3, 0, 0),
            DeleteComputedProperty { .. } => (2, 1, 0),
            GetSuperProperty { .. } => (0, 1, 0),
            SetSuperProperty { .. } => (1, 0, 0),

            DestructArray { indices, .. } => (1, indices.len(), 0),
            DestructArrayAndReassign { indices, .. } => (1 + indices.len(), 0, 0),
            DestructObject {
                properties,
                has_rest_element,
            } => (1, properties.len() + usize::from(*has_rest_element), 0),
            DestructObjectAndReassign {
                properties,
                has_rest_element,
            } => (1 + properties.len() + usize::from(*has_rest_element), 0, 0),

            CallFunction { num_arguments, .. } => (1 + num_arguments, 1, 0),
            Construct { num_arguments, .. } => (1 + num_arguments, 1, 0),
            CallMethod { num_arguments, .. } => (1 + num_arguments, 1, 0),
            CallComputedMethod { num_arguments, .. } => (2 + num_arguments, 1, 0),
            CallSuperConstructor { num_arguments } => (*num_arguments, 0, 0),
            CallSuperMethod { num_arguments, .. } => (*num_arguments, 1, 0),

            UnaryOperation { .. } => (1, 1, 0),
            BinaryOperation { .. } | Compare { .. } => (2, 1, 0),
            TernaryOperation => (3, 1, 0),
            TypeOf => (1, 1, 0),
            InstanceOf | In => (2, 1, 0),
            VoidOperation | Dup => (1, 1, 0),
            Reassign => (2, 0, 0),
            Await => (1, 1, 0),
            Yield { has_argument } => (usize::from(*has_argument), 1, 0),
            YieldEach => (1, 0, 0),
            ThrowException => (1, 0, 0),

            BeginIf { .. } => (1, 0, 0),
            BeginElse | EndIf => (0, 0, 0),
            BeginSwitch => (1, 0, 0),
            BeginSwitchCase => (1, 0, 0),
            BeginSwitchDefaultCase | EndSwitchCase | EndSwitch => (0, 0, 0),

            BeginWhileLoopHeader => (0, 0, 0),
            BeginWhileLoopBody => (1, 0, 0),
            EndWhileLoop => (0, 0, 0),
            BeginDoWhileLoopBody | BeginDoWhileLoopHeader => (0, 0, 0),
            EndDoWhileLoop => (1, 0, 0),
            BeginForLoopInitializer => (0, 0, 0),
            BeginForLoopCondition { num_loop_variables } => {
                (*num_loop_variables, 0, *num_loop_variables)
            }
            BeginForLoopAfterthought { num_loop_variables } => (0, 0, *num_loop_variables),
            BeginForLoopBody { num_loop_variables } => (1, 0, *num_loop_variables),
            EndForLoop => (0, 0, 0),
            BeginForInLoop | BeginForOfLoop => (1, 0, 1),
            BeginForOfLoopWithDestruct { indices, .. } => (1, 0, indices.len()),
            EndForInLoop | EndForOfLoop => (0, 0, 0),
            BeginRepeatLoop {
                exposes_loop_counter,
                ..
            } => (0, 0, usize::from(*exposes_loop_counter)),
            EndRepeatLoop => (0, 0, 0),
            LoopBreak | LoopContinue => (0, 0, 0),

            BeginBlockStatement | EndBlockStatement => (0, 0, 0),
            BeginTry => (0, 0, 0),
            BeginCatch => (0, 0, 1),
            BeginFinally | EndTryCatchFinally => (0, 0, 0),

            BeginPlainFunction { parameters }
            | BeginArrowFunction { parameters }
            | BeginGeneratorFunction { parameters }
            | BeginAsyncFunction { parameters }
            | BeginAsyncArrowFunction { parameters }
            | BeginAsyncGeneratorFunction { parameters } => (0, 1, parameters.count),
            EndPlainFunction
            | EndArrowFunction
            | EndGeneratorFunction
            | EndAsyncFunction
            | EndAsyncArrowFunction
            | EndAsyncGeneratorFunction => (0, 0, 0),
            Return { has_value } => (usize::from(*has_value), 0, 0),

            CreateWasmGlobal { .. } => (1, 1, 0),
            CreateWasmTable { .. } | CreateWasmMemory { .. } | CreateWasmJsTag { .. } => (0, 1, 0),

            BeginWasmModule => (0, 0, 0),
            EndWasmModule => (0, 1, 0),
            BeginWasmFunction { signature } => (0, 0, signature.parameters.len()),
            EndWasmFunction => (0, 1, 0),
            WasmReturn { num_values } => (*num_values, 0, 0),
            WasmJsCall { signature } => (1 + signature.parameters.len(), signature.results.len(), 0),
            WasmCallDirect { signature } => {
                (1 + signature.parameters.len(), signature.results.len(), 0)
            }
            WasmCallIndirect { signature } => {
                (2 + signature.parameters.len(), signature.results.len(), 0)
            }

            WasmBeginTypeGroup | WasmEndTypeGroup => (0, 0, 0),
            WasmDefineSignatureType {
                parameters,
                results,
            } => (
                num_type_inputs(parameters.iter().chain(results.iter())),
                1,
                0,
            ),
            WasmDefineArrayType { element, .. } => {
                (num_type_inputs(std::iter::once(element)), 1, 0)
            }
            WasmDefineStructType { fields } => {
                (num_type_inputs(fields.iter().map(|f| &f.ty)), 1, 0)
            }
            WasmDefineForwardOrSelfReference => (0, 1, 0),
            WasmResolveForwardReference => (2, 0, 0),

            WasmConsti32 { .. } | WasmConsti64 { .. } | WasmConstf32 { .. }
            | WasmConstf64 { .. } | WasmConstSimd128 { .. } => (0, 1, 0),
            WasmI32BinOp { .. } | WasmI64BinOp { .. } | WasmF32BinOp { .. }
            | WasmF64BinOp { .. } => (2, 1, 0),
            WasmI32UnOp { .. } | WasmI64UnOp { .. } | WasmF32UnOp { .. } | WasmF64UnOp { .. } => {
                (1, 1, 0)
            }
            WasmI32CompareOp { .. } | WasmI64CompareOp { .. } | WasmF32CompareOp { .. }
            | WasmF64CompareOp { .. } => (2, 1, 0),
            WasmWrapI64ToI32 | WasmExtendI32ToI64 { .. } => (1, 1, 0),
            WasmSelect => (3, 1, 0),
            WasmUnreachable => (0, 0, 0),

            WasmRefNull { heap } => (usize::from(heap.is_none()), 1, 0),
            WasmRefIsNull => (1, 1, 0),
            WasmRefFunc | WasmRefI31 | WasmI31Get { .. } => (1, 1, 0),
            WasmStructNew { num_field_values } => (1 + num_field_values, 1, 0),
            WasmStructNewDefault => (1, 1, 0),
            WasmStructGet { .. } => (1, 1, 0),
            WasmStructSet { .. } => (2, 0, 0),
            WasmArrayNewFixed { num_elements } => (1 + num_elements, 1, 0),
            WasmArrayNewDefault => (2, 1, 0),
            WasmArrayLen => (1, 1, 0),
            WasmArrayGet { .. } => (2, 1, 0),
            WasmArraySet => (3, 0, 0),

            WasmDefineGlobal { .. } => (0, 1, 0),
            WasmGlobalGet => (1, 1, 0),
            WasmGlobalSet => (2, 0, 0),
            WasmDefineTable { .. } => (0, 1, 0),
            WasmTableGet => (2, 1, 0),
            WasmTableSet => (3, 0, 0),
            WasmDefineMemory { .. } => (0, 1, 0),
            WasmMemoryLoad { .. } => (2, 1, 0),
            WasmMemoryStore { .. } => (3, 0, 0),
            WasmDefineTag { .. } => (0, 1, 0),
            WasmThrow { num_arguments } => (1 + num_arguments, 0, 0),
            WasmRethrow => (1, 0, 0),

            WasmBeginBlock { signature } | WasmBeginLoop { signature }
            | WasmBeginTry { signature } => {
                (signature.parameters.len(), 0, 1 + signature.parameters.len())
            }
            WasmBeginIf { signature, .. } => {
                (1 + signature.parameters.len(), 0, 1 + signature.parameters.len())
            }
            WasmBeginElse { signature } => (0, 0, 1 + signature.parameters.len()),
            WasmBeginCatch { num_tag_parameters } => (1, 0, 2 + num_tag_parameters),
            WasmBeginCatchAll => (0, 0, 1),
            WasmBeginTryTable { signature, catches } => (
                signature.parameters.len()
                    + catches.iter().filter(|c| c.consumes_tag()).count(),
                0,
                1 + signature.parameters.len(),
            ),
            WasmBeginTryDelegate { signature } => {
                (1 + signature.parameters.len(), 0, 1 + signature.parameters.len())
            }
            WasmEndBlock { num_results }
            | WasmEndIf { num_results }
            | WasmEndLoop { num_results }
            | WasmEndTry { num_results }
            | WasmEndTryTable { num_results }
            | WasmEndTryDelegate { num_results } => (0, *num_results, 0),
            WasmBranch { num_arguments } => (1 + num_arguments, 0, 0),
            WasmBranchIf { num_arguments } => (2 + num_arguments, 0, 0),
        }
    }

    #[must_use]
    pub fn num_inputs(&self) -> usize {
        self.shape().0
    }

    #[must_use]
    pub fn num_outputs(&self) -> usize {
        self.shape().1
    }

    #[must_use]
    pub fn num_inner_outputs(&self) -> usize {
        self.shape().2
    }

    /// Whether this operation swallows runtime exceptions. Guarded outputs
    /// are defined to be the top type.
    #[must_use]
    pub fn is_guarded(&self) -> bool {
        use Operation::*;
        match self {
            GetProperty { is_guarded, .. }
            | DeleteProperty { is_guarded, .. }
            | GetElement { is_guarded, .. }
            | GetComputedProperty { is_guarded }
            | DeleteComputedProperty { is_guarded }
            | CallFunction { is_guarded, .. }
            | Construct { is_guarded, .. }
            | CallMethod { is_guarded, .. }
            | CallComputedMethod { is_guarded, .. } => *is_guarded,
            _ => false,
        }
    }

    /// Whether this operation executes in Wasm context. Variables consumed
    /// by Wasm-context operations but defined outside one are module
    /// imports.
    #[must_use]
    pub fn is_wasm(&self) -> bool {
        use Operation::*;
        matches!(
            self,
            BeginWasmFunction { .. } | EndWasmFunction | WasmReturn { .. } | WasmJsCall { .. }
                | WasmCallDirect { .. } | WasmCallIndirect { .. } | WasmBeginTypeGroup
                | WasmEndTypeGroup | WasmDefineSignatureType { .. } | WasmDefineArrayType { .. }
                | WasmDefineStructType { .. } | WasmDefineForwardOrSelfReference
                | WasmResolveForwardReference | WasmConsti32 { .. } | WasmConsti64 { .. }
                | WasmConstf32 { .. } | WasmConstf64 { .. } | WasmConstSimd128 { .. }
                | WasmI32BinOp { .. } | WasmI64BinOp { .. } | WasmF32BinOp { .. }
                | WasmF64BinOp { .. } | WasmI32UnOp { .. } | WasmI64UnOp { .. }
                | WasmF32UnOp { .. } | WasmF64UnOp { .. } | WasmI32CompareOp { .. }
                | WasmI64CompareOp { .. } | WasmF32CompareOp { .. } | WasmF64CompareOp { .. }
                | WasmWrapI64ToI32 | WasmExtendI32ToI64 { .. } | WasmSelect | WasmUnreachable
                | WasmRefNull { .. } | WasmRefIsNull | WasmRefFunc | WasmRefI31
                | WasmI31Get { .. } | WasmStructNew { .. } | WasmStructNewDefault
                | WasmStructGet { .. } | WasmStructSet { .. } | WasmArrayNewFixed { .. }
                | WasmArrayNewDefault | WasmArrayLen | WasmArrayGet { .. } | WasmArraySet
                | WasmDefineGlobal { .. } | WasmGlobalGet | WasmGlobalSet
                | WasmDefineTable { .. } | WasmTableGet | WasmTableSet
                | WasmDefineMemory { .. } | WasmMemoryLoad { .. } | WasmMemoryStore { .. }
                | WasmDefineTag { .. } | WasmThrow { .. } | WasmRethrow
                | WasmBeginBlock { .. } | WasmEndBlock { .. } | WasmBeginIf { .. }
                | WasmBeginElse { .. } | WasmEndIf { .. } | WasmBeginLoop { .. }
                | WasmEndLoop { .. } | WasmBeginTry { .. } | WasmBeginCatch { .. }
                | WasmBeginCatchAll | WasmEndTry { .. } | WasmBeginTryTable { .. }
                | WasmEndTryTable { .. } | WasmBeginTryDelegate { .. }
                | WasmEndTryDelegate { .. } | WasmBranch { .. } | WasmBranchIf { .. }
        )
    }

    /// The declared parameter shape of a subroutine-begin operation.
    #[must_use]
    pub fn subroutine_parameters(&self) -> Option<SubroutineParameters> {
        use Operation::*;
        match self {
            BeginPlainFunction { parameters }
            | BeginArrowFunction { parameters }
            | BeginGeneratorFunction { parameters }
            | BeginAsyncFunction { parameters }
            | BeginAsyncArrowFunction { parameters }
            | BeginAsyncGeneratorFunction { parameters }
            | BeginObjectLiteralMethod { parameters, .. }
            | BeginObjectLiteralComputedMethod { parameters }
            | BeginClassConstructor { parameters }
            | BeginClassInstanceMethod { parameters, .. }
            | BeginClassStaticMethod { parameters, .. } => Some(*parameters),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shapes() {
        assert_eq!(Operation::LoadInteger { value: 1 }.shape(), (0, 1, 0));
        assert_eq!(
            Operation::CallMethod {
                name: "m".into(),
                num_arguments: 2,
                is_guarded: false
            }
            .shape(),
            (3, 1, 0)
        );
        assert_eq!(
            Operation::BeginPlainFunction {
                parameters: SubroutineParameters::simple(2)
            }
            .shape(),
            (0, 1, 2)
        );
        assert_eq!(
            Operation::BeginClassConstructor {
                parameters: SubroutineParameters::simple(1)
            }
            .shape(),
            (0, 0, 2)
        );
    }

    #[test]
    fn test_type_definition_input_counts() {
        let op = Operation::WasmDefineStructType {
            fields: vec![
                WasmStructField {
                    ty: WasmTypeRefOperand::Value(Type::WASM_I32),
                    mutable: true,
                },
                WasmStructField {
                    ty: WasmTypeRefOperand::TypeIndex {
                        input: 1,
                        nullable: true,
                    },
                    mutable: false,
                },
                WasmStructField {
                    ty: WasmTypeRefOperand::TypeIndex {
                        input: 0,
                        nullable: false,
                    },
                    mutable: false,
                },
            ],
        };
        assert_eq!(op.shape(), (2, 1, 0));
    }

    #[test]
    fn test_guarded_flag() {
        assert!(
            Operation::GetProperty {
                name: "p".into(),
                is_guarded: true
            }
            .is_guarded()
        );
        assert!(!Operation::LoadUndefined.is_guarded());
    }

    #[test]
    fn test_wasm_context_flag() {
        assert!(Operation::WasmConsti32 { value: 0 }.is_wasm());
        assert!(!Operation::BeginWasmModule.is_wasm());
        assert!(!Operation::CreateWasmGlobal {
            value_type: Type::WASM_I32,
            mutable: true
        }
        .is_wasm());
    }
}
