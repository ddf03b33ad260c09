//! # VM Configuration
//!
//! Runtime knobs for the memory manager, read from the classic kernel
//! configuration file format:
//!
//! ```text
//! Processor.numPhysPages = 16
//! Kernel.processClassName = nachos.vm.VMProcess
//! VM.swapFile = swapFile   # comments run to end of line
//! ```

use crate::memory::{DEFAULT_PHYS_PAGES, DEFAULT_SWAP_FILE, MAX_PHYS_PAGES, STACK_PAGES};
use alloc::string::{String, ToString};
use core::fmt;
use utils_accessors_derive::Accessors;

/// How a process's pages are backed.
#[derive(Debug, Copy, Clone, Default, Eq, PartialEq)]
pub enum PagingMode {
    /// Every page gets a frame at load time and keeps it until teardown.
    Eager,
    /// Pages get frames on first touch and may be evicted to swap.
    #[default]
    Demand,
}

impl PagingMode {
    /// Map a process class name from the configuration file.
    #[must_use]
    pub fn from_class_name(name: &str) -> Option<Self> {
        match name {
            "nachos.userprog.UserProcess" => Some(Self::Eager),
            "nachos.vm.VMProcess" => Some(Self::Demand),
            _ => None,
        }
    }
}

impl fmt::Display for PagingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Eager => f.write_str("eager"),
            Self::Demand => f.write_str("demand"),
        }
    }
}

#[derive(Debug, Clone, Eq, PartialEq, thiserror::Error)]
pub enum ConfigError {
    #[error("physical memory must have at least one frame")]
    NoFrames,
    #[error("{0} frames exceed the frame number limit of {max}", max = MAX_PHYS_PAGES)]
    TooManyFrames(u32),
    #[error("the stack needs at least one page")]
    NoStack,
    #[error("swap file name must not be empty")]
    EmptySwapFile,
    #[error("line {line}: expected `key = value`")]
    MalformedLine { line: usize },
    #[error("line {line}: invalid value {value:?} for {key}")]
    InvalidValue {
        line: usize,
        key: String,
        value: String,
    },
}

/// Memory manager configuration.
#[derive(Debug, Clone, Eq, PartialEq, Accessors)]
pub struct VmConfig {
    /// Number of physical frames.
    phys_pages: u32,
    /// Stack pages per process.
    stack_pages: u32,
    /// Pager used for newly spawned processes.
    paging: PagingMode,
    #[accessors(skip)]
    swap_file: String,
}

impl Default for VmConfig {
    fn default() -> Self {
        Self {
            phys_pages: DEFAULT_PHYS_PAGES,
            stack_pages: STACK_PAGES,
            paging: PagingMode::default(),
            swap_file: DEFAULT_SWAP_FILE.to_string(),
        }
    }
}

impl VmConfig {
    #[must_use]
    pub fn swap_file(&self) -> &str {
        &self.swap_file
    }

    pub fn set_swap_file(&mut self, name: impl Into<String>) -> &mut Self {
        self.swap_file = name.into();
        self
    }

    #[must_use]
    pub fn with_swap_file(mut self, name: impl Into<String>) -> Self {
        self.swap_file = name.into();
        self
    }

    /// Check the configuration can drive a kernel.
    ///
    /// # Errors
    /// Returns the first [`ConfigError`] found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.phys_pages == 0 {
            return Err(ConfigError::NoFrames);
        }
        if self.phys_pages > MAX_PHYS_PAGES {
            return Err(ConfigError::TooManyFrames(self.phys_pages));
        }
        if self.stack_pages == 0 {
            return Err(ConfigError::NoStack);
        }
        if self.swap_file.is_empty() {
            return Err(ConfigError::EmptySwapFile);
        }
        Ok(())
    }

    /// Parse `key = value` lines on top of the defaults and validate the result.
    ///
    /// Unknown keys are ignored so one file can configure the whole kernel.
    ///
    /// # Errors
    /// Malformed lines, unparsable values, and failed validation.
    pub fn parse(text: &str) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        for (index, raw) in text.lines().enumerate() {
            let line = index + 1;
            let content = raw.split('#').next().unwrap_or_default().trim();
            if content.is_empty() {
                continue;
            }

            let Some((key, value)) = content.split_once('=') else {
                return Err(ConfigError::MalformedLine { line });
            };
            let (key, value) = (key.trim(), value.trim());
            let invalid = || ConfigError::InvalidValue {
                line,
                key: key.to_string(),
                value: value.to_string(),
            };

            match key {
                "Processor.numPhysPages" => {
                    config.phys_pages = value.parse().map_err(|_| invalid())?;
                }
                "Process.stackPages" => {
                    config.stack_pages = value.parse().map_err(|_| invalid())?;
                }
                "Kernel.processClassName" => {
                    config.paging = PagingMode::from_class_name(value).ok_or_else(invalid)?;
                }
                "VM.swapFile" => {
                    if value.is_empty() {
                        return Err(invalid());
                    }
                    config.swap_file = value.to_string();
                }
                _ => {}
            }
        }

        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let c = VmConfig::default();
        assert_eq!(c.phys_pages(), DEFAULT_PHYS_PAGES);
        assert_eq!(c.stack_pages(), STACK_PAGES);
        assert_eq!(c.paging(), PagingMode::Demand);
        assert_eq!(c.swap_file(), "swapFile");
        assert_eq!(c.validate(), Ok(()));
    }

    #[test]
    fn builder_style_setters() {
        let c = VmConfig::default()
            .with_phys_pages(4)
            .with_paging(PagingMode::Eager)
            .with_swap_file("swap.bin");
        assert_eq!(c.phys_pages(), 4);
        assert_eq!(c.paging(), PagingMode::Eager);
        assert_eq!(c.swap_file(), "swap.bin");
    }

    #[test]
    fn validate_rejects_bad_sizes() {
        assert_eq!(
            VmConfig::default().with_phys_pages(0).validate(),
            Err(ConfigError::NoFrames)
        );
        assert_eq!(
            VmConfig::default()
                .with_phys_pages(MAX_PHYS_PAGES + 1)
                .validate(),
            Err(ConfigError::TooManyFrames(MAX_PHYS_PAGES + 1))
        );
        assert_eq!(
            VmConfig::default().with_stack_pages(0).validate(),
            Err(ConfigError::NoStack)
        );
        assert_eq!(
            VmConfig::default().with_swap_file("").validate(),
            Err(ConfigError::EmptySwapFile)
        );
    }

    #[test]
    fn parse_reads_known_keys_and_skips_comments() {
        let text = "\
# machine
Processor.numPhysPages = 16
Kernel.processClassName = nachos.userprog.UserProcess  # flat
Machine.stubFileSystem = true
VM.swapFile = pages.swp
";
        let c = VmConfig::parse(text).unwrap();
        assert_eq!(c.phys_pages(), 16);
        assert_eq!(c.paging(), PagingMode::Eager);
        assert_eq!(c.swap_file(), "pages.swp");
        assert_eq!(c.stack_pages(), STACK_PAGES);
    }

    #[test]
    fn parse_reports_line_numbers() {
        assert_eq!(
            VmConfig::parse("\nnot a pair\n"),
            Err(ConfigError::MalformedLine { line: 2 })
        );
        assert!(matches!(
            VmConfig::parse("Processor.numPhysPages = lots"),
            Err(ConfigError::InvalidValue { line: 1, .. })
        ));
        assert!(matches!(
            VmConfig::parse("Kernel.processClassName = nachos.Unknown"),
            Err(ConfigError::InvalidValue { .. })
        ));
        assert_eq!(
            VmConfig::parse("Processor.numPhysPages = 0"),
            Err(ConfigError::NoFrames)
        );
    }
}
