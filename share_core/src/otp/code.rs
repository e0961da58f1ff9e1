//! Share code generation

use rand::Rng;

/// Lowest and highest 6-digit code (900,000 possible values)
pub const CODE_MIN: u32 = 100_000;
pub const CODE_MAX: u32 = 999_999;

/// Source of candidate codes. The registry retries on collision, so an
/// implementation only has to produce plausible candidates.
pub trait CodeGenerator: Send + Sync {
    fn generate(&self) -> String;
}

/// Uniformly random 6-digit numeric codes
#[derive(Debug, Default, Clone, Copy)]
pub struct RandomCodeGenerator;

impl CodeGenerator for RandomCodeGenerator {
    fn generate(&self) -> String {
        let code = rand::rng().random_range(CODE_MIN..=CODE_MAX);
        code.to_string()
    }
}

/// Check that a presented code has the issued shape before touching the registry
pub fn is_well_formed(code: &str) -> bool {
    code.len() == 6 && code.bytes().all(|b| b.is_ascii_digit())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_code_format() {
        let generator = RandomCodeGenerator;
        for _ in 0..1000 {
            let code = generator.generate();
            assert_eq!(code.len(), 6);
            assert!(code.chars().all(|c| c.is_ascii_digit()));
            assert!(!code.starts_with('0'));
        }
    }

    #[test]
    fn test_well_formed() {
        assert!(is_well_formed("123456"));
        assert!(!is_well_formed("12345"));
        assert!(!is_well_formed("12345a"));
        assert!(!is_well_formed(" 123456"));
    }
}
