//! Fixed-width numeric code generation

use rand::Rng;

/// Produces candidate access codes.
///
/// Candidates carry no uniqueness guarantee; the issuer checks them against the store.
pub trait CodeGenerator: Send + Sync {
    /// Draw a candidate code
    fn generate(&self) -> String;

    /// Number of digits in every generated code
    fn width(&self) -> usize;
}

/// Uniform random codes in `[0, 10^width)`, zero-padded
#[derive(Debug, Clone, Copy)]
pub struct RandomCodeGenerator {
    width: usize,
    upper: u32,
}

impl RandomCodeGenerator {
    /// Create a generator for `width`-digit codes (1..=9)
    pub fn new(width: usize) -> Self {
        let width = width.clamp(1, vrgate_core::config::MAX_CODE_WIDTH);
        Self {
            width,
            upper: 10u32.pow(width as u32),
        }
    }
}

impl Default for RandomCodeGenerator {
    fn default() -> Self {
        Self::new(6)
    }
}

impl CodeGenerator for RandomCodeGenerator {
    fn generate(&self) -> String {
        let n: u32 = rand::thread_rng().gen_range(0..self.upper);
        format!("{:0width$}", n, width = self.width)
    }

    fn width(&self) -> usize {
        self.width
    }
}

/// Check that `code` is exactly `width` ASCII digits
pub fn is_valid_code(code: &str, width: usize) -> bool {
    code.len() == width && code.bytes().all(|b| b.is_ascii_digit())
}
