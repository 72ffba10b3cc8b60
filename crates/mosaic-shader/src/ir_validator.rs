//! Well-formedness checks for SPIR-V against the Vulkan 1.1 environment (SPIR-V 1.0 - 1.3).

use std::fmt;

use rspirv::binary::{DecodeError, ParseState};
use rspirv::dr::{Module, Operand};
use rspirv::spirv::{self, MAGIC_NUMBER};
use tracing::{debug, warn};

use crate::error::ValidationError;
use crate::limits::MAX_SPIRV_WORDS;

const HEADER_WORDS: usize = 5;

/// Highest SPIR-V minor version (major 1) accepted by the Vulkan 1.1 environment.
const MAX_SPIRV_MINOR_VERSION: u32 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum DiagnosticLevel {
    Error,
    Warning,
    Info,
}

impl fmt::Display for DiagnosticLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DiagnosticLevel::Error => f.write_str("error"),
            DiagnosticLevel::Warning => f.write_str("warning"),
            DiagnosticLevel::Info => f.write_str("info"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub level: DiagnosticLevel,
    /// Word index the diagnostic refers to, when the checker knows it.
    pub position: Option<usize>,
    pub message: String,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.position {
            Some(position) => write!(f, "{}: line {}: {}", self.level, position, self.message),
            None => write!(f, "{}: {}", self.level, self.message),
        }
    }
}

/// Every diagnostic emitted while validating one module, in emission order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DiagnosticReport {
    diagnostics: Vec<Diagnostic>,
}

impl DiagnosticReport {
    fn push(&mut self, level: DiagnosticLevel, position: Option<usize>, message: impl Into<String>) {
        self.diagnostics.push(Diagnostic {
            level,
            position,
            message: message.into(),
        });
    }

    fn error(&mut self, position: Option<usize>, message: impl Into<String>) {
        self.push(DiagnosticLevel::Error, position, message);
    }

    pub fn has_errors(&self) -> bool {
        self.diagnostics
            .iter()
            .any(|d| d.level == DiagnosticLevel::Error)
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    pub fn is_empty(&self) -> bool {
        self.diagnostics.is_empty()
    }

    fn finish(self) -> Result<DiagnosticReport, ValidationError> {
        for diagnostic in &self.diagnostics {
            if diagnostic.level == DiagnosticLevel::Warning {
                warn!(%diagnostic, "SPIR-V validation warning");
            }
        }
        if self.has_errors() {
            Err(ValidationError::Spirv(self))
        } else {
            Ok(self)
        }
    }
}

impl fmt::Display for DiagnosticReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, diagnostic) in self.diagnostics.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            write!(f, "{diagnostic}")?;
        }
        Ok(())
    }
}

/// Validates a SPIR-V module.
///
/// Returns the (error-free) report on success so callers can surface warnings and notes. Any
/// error-level diagnostic fails validation with the full report attached.
pub fn validate_spirv(words: &[u32]) -> Result<DiagnosticReport, ValidationError> {
    if words.len() > MAX_SPIRV_WORDS {
        return Err(ValidationError::TooLarge {
            words: words.len(),
            max: MAX_SPIRV_WORDS,
        });
    }

    let mut report = DiagnosticReport::default();

    check_header(words, &mut report);
    if report.has_errors() {
        return report.finish();
    }

    let module = match rspirv::dr::load_words(words) {
        Ok(module) => module,
        Err(state) => {
            report.error(parse_error_position(&state), format!("failed to parse module: {state}"));
            return report.finish();
        }
    };

    check_module_structure(&module, &mut report);
    if report.has_errors() {
        return report.finish();
    }

    check_semantics(words, &mut report);
    debug!(
        words = words.len(),
        diagnostics = report.diagnostics.len(),
        "validated SPIR-V module"
    );
    report.finish()
}

fn check_header(words: &[u32], report: &mut DiagnosticReport) {
    if words.len() < HEADER_WORDS {
        report.error(
            None,
            format!(
                "module of {} words is too short to hold a SPIR-V header",
                words.len()
            ),
        );
        return;
    }

    if words[0] == MAGIC_NUMBER.swap_bytes() {
        report.error(Some(0), "module has the wrong endianness");
        return;
    }
    if words[0] != MAGIC_NUMBER {
        report.error(Some(0), format!("invalid magic number {:#010x}", words[0]));
        return;
    }

    let major = (words[1] >> 16) & 0xff;
    let minor = (words[1] >> 8) & 0xff;
    if major != 1 || minor > MAX_SPIRV_MINOR_VERSION {
        report.error(
            Some(1),
            format!(
                "SPIR-V version {major}.{minor} is not valid for the Vulkan 1.1 target (maximum 1.{MAX_SPIRV_MINOR_VERSION})"
            ),
        );
    }
    if words[2] == 0 {
        report.push(
            DiagnosticLevel::Info,
            Some(2),
            "generator magic number is unregistered (0)",
        );
    }
    if words[3] == 0 {
        report.error(Some(3), "id bound must be non-zero");
    }
    if words[4] != 0 {
        report.push(
            DiagnosticLevel::Warning,
            Some(4),
            format!("reserved schema word is {:#x}, expected 0", words[4]),
        );
    }
}

/// Word index of a parser failure. The parser reports byte offsets.
fn parse_error_position(state: &ParseState) -> Option<usize> {
    let byte_offset = match state {
        ParseState::WordCountZero(offset, _)
        | ParseState::OpcodeUnknown(offset, _, _)
        | ParseState::OperandExpected(offset, _)
        | ParseState::OperandExceeded(offset, _)
        | ParseState::TypeUnsupported(offset, _)
        | ParseState::SpecConstantOpIntegerIncorrect(offset, _)
        | ParseState::OperandError(
            DecodeError::StreamExpected(offset)
            | DecodeError::LimitReached(offset)
            | DecodeError::DecodeStringFailed(offset, _),
        ) => *offset,
        _ => return None,
    };
    Some(byte_offset / 4)
}

fn check_module_structure(module: &Module, report: &mut DiagnosticReport) {
    match &module.memory_model {
        None => report.error(None, "module is missing OpMemoryModel"),
        Some(inst) => {
            if inst.operands.first()
                != Some(&Operand::AddressingModel(spirv::AddressingModel::Logical))
            {
                report.error(None, "Vulkan requires the Logical addressing model");
            }
        }
    }

    let declares_shader = module.capabilities.iter().any(|inst| {
        inst.operands.first() == Some(&Operand::Capability(spirv::Capability::Shader))
    });
    if !declares_shader {
        report.error(None, "module does not declare the Shader capability");
    }

    match module.entry_points.as_slice() {
        [] => report.error(None, "module declares no OpEntryPoint"),
        [_] => {}
        [first, rest @ ..] => {
            let name = match first.operands.get(2) {
                Some(Operand::LiteralString(name)) => name.as_str(),
                _ => "<unnamed>",
            };
            report.push(
                DiagnosticLevel::Warning,
                None,
                format!(
                    "module declares {} entry points; only the first (`{name}`) is used",
                    rest.len() + 1
                ),
            );
        }
    }

    let bound = module.header.as_ref().map_or(0, |header| header.bound);
    let out_of_bound = module.all_inst_iter().find_map(|inst| {
        inst.result_id
            .into_iter()
            .chain(inst.result_type)
            .chain(inst.operands.iter().filter_map(|operand| match operand {
                Operand::IdRef(id) => Some(*id),
                _ => None,
            }))
            .find(|&id| id >= bound)
    });
    if let Some(id) = out_of_bound {
        report.error(None, format!("id %{id} is not below the module's id bound {bound}"));
    }
}

fn check_semantics(words: &[u32], report: &mut DiagnosticReport) {
    // The frontend covers a subset of valid SPIR-V (it rejects std140 matrix strides, for one),
    // so a rejection here is not evidence of an invalid module.
    let module = match crate::reflect::parse_with_naga(words) {
        Ok(module) => module,
        Err(message) => {
            report.push(
                DiagnosticLevel::Warning,
                None,
                format!("semantic validation skipped, naga could not represent the module: {message}"),
            );
            return;
        }
    };

    let mut validator = naga::valid::Validator::new(
        naga::valid::ValidationFlags::all(),
        naga::valid::Capabilities::all(),
    );
    if let Err(err) = validator.validate(&module) {
        report.error(None, error_chain(&err));
    }
}

/// Renders an error followed by its `source()` chain on one line.
pub(crate) fn error_chain(err: &dyn std::error::Error) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(inner) = source {
        message.push_str(": ");
        message.push_str(&inner.to_string());
        source = inner.source();
    }
    message
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_module_fails_without_position() {
        let err = validate_spirv(&[MAGIC_NUMBER, 0x0001_0000]).unwrap_err();
        let ValidationError::Spirv(report) = err else {
            panic!("expected a SPIR-V report");
        };
        assert_eq!(report.diagnostics().len(), 1);
        assert_eq!(report.diagnostics()[0].position, None);
    }

    #[test]
    fn byte_swapped_magic_reports_endianness() {
        let err = validate_spirv(&[MAGIC_NUMBER.swap_bytes(), 0x0001_0000, 0, 1, 0]).unwrap_err();
        assert_eq!(
            err.to_string(),
            "SPIRV Validation failure:\nerror: line 0: module has the wrong endianness"
        );
    }

    #[test]
    fn rejects_versions_past_vulkan_1_1() {
        let err = validate_spirv(&[MAGIC_NUMBER, 0x0001_0500, 7, 1, 0]).unwrap_err();
        let ValidationError::Spirv(report) = err else {
            panic!("expected a SPIR-V report");
        };
        let first = &report.diagnostics()[0];
        assert_eq!(first.level, DiagnosticLevel::Error);
        assert_eq!(first.position, Some(1));
    }

    #[test]
    fn report_keeps_warnings_alongside_errors() {
        // Bad bound plus non-zero schema: one error, one warning, one note.
        let err = validate_spirv(&[MAGIC_NUMBER, 0x0001_0000, 0, 0, 5]).unwrap_err();
        let ValidationError::Spirv(report) = err else {
            panic!("expected a SPIR-V report");
        };
        let levels: Vec<_> = report.diagnostics().iter().map(|d| d.level).collect();
        assert_eq!(
            levels,
            vec![
                DiagnosticLevel::Info,
                DiagnosticLevel::Error,
                DiagnosticLevel::Warning
            ]
        );
        let rendered = report.to_string();
        assert!(rendered.contains("error: line 3: id bound must be non-zero"), "{rendered}");
        assert!(rendered.contains("warning: line 4:"), "{rendered}");
    }

    fn parse_failure(words: &[u32]) -> Diagnostic {
        let ValidationError::Spirv(report) = validate_spirv(words).unwrap_err() else {
            panic!("expected a SPIR-V report");
        };
        report.diagnostics()[report.diagnostics().len() - 1].clone()
    }

    #[test]
    fn zero_word_count_is_positioned() {
        let diagnostic = parse_failure(&[MAGIC_NUMBER, 0x0001_0300, 1, 8, 0, 0]);
        assert_eq!(diagnostic.level, DiagnosticLevel::Error);
        assert_eq!(diagnostic.position, Some(5));
    }

    #[test]
    fn truncated_instruction_is_positioned_at_the_end() {
        // OpTypeInt %1 32, missing its signedness operand.
        let words = [MAGIC_NUMBER, 0x0001_0300, 1, 8, 0, (4 << 16) | 21, 1, 32];
        let diagnostic = parse_failure(&words);
        assert_eq!(diagnostic.position, Some(words.len()));
        assert!(diagnostic.message.starts_with("failed to parse module:"), "{}", diagnostic.message);
    }

    fn minimal_compute() -> Vec<u32> {
        use rspirv::binary::Assemble;

        let mut b = rspirv::dr::Builder::new();
        b.set_version(1, 3);
        b.capability(spirv::Capability::Shader);
        b.memory_model(spirv::AddressingModel::Logical, spirv::MemoryModel::GLSL450);
        let void = b.type_void();
        let fn_ty = b.type_function(void, vec![]);
        let main = b
            .begin_function(void, None, spirv::FunctionControl::NONE, fn_ty)
            .unwrap();
        b.begin_block(None).unwrap();
        b.ret().unwrap();
        b.end_function().unwrap();
        b.entry_point(spirv::ExecutionModel::GLCompute, main, "main", []);
        b.execution_mode(main, spirv::ExecutionMode::LocalSize, [1, 1, 1]);
        b.module().assemble()
    }

    #[test]
    fn minimal_compute_module_is_valid() {
        let report = validate_spirv(&minimal_compute()).unwrap();
        assert!(!report.has_errors());
    }

    #[test]
    fn ids_past_the_bound_are_rejected() {
        let mut words = minimal_compute();
        words[3] = 2;
        let err = validate_spirv(&words).unwrap_err();
        assert!(
            err.to_string().contains("is not below the module's id bound 2"),
            "{err}"
        );
    }
}
