//! Source languages and language standards.

use std::str::FromStr;

use crate::error::ConfigError;

/// Source language of a translation unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Language {
    /// C language (default)
    #[default]
    C,
    /// C++ language
    Cxx,
}

impl Language {
    pub fn as_str(&self) -> &'static str {
        match self {
            Language::C => "c",
            Language::Cxx => "c++",
        }
    }
}

/// C++ standard version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum CppStandard {
    Cpp11,
    Cpp14,
    Cpp17,
    Cpp20,
    Cpp23,
}

impl CppStandard {
    /// Get the standard as a compiler flag value (e.g., "c++17").
    pub fn as_flag_value(&self) -> &'static str {
        match self {
            CppStandard::Cpp11 => "c++11",
            CppStandard::Cpp14 => "c++14",
            CppStandard::Cpp17 => "c++17",
            CppStandard::Cpp20 => "c++20",
            CppStandard::Cpp23 => "c++23",
        }
    }

    /// Get the MSVC-style flag value. MSVC has no c++11 flag and spells
    /// C++23 as "c++latest".
    pub fn as_msvc_flag_value(&self) -> &'static str {
        match self {
            CppStandard::Cpp11 | CppStandard::Cpp14 => "c++14",
            CppStandard::Cpp17 => "c++17",
            CppStandard::Cpp20 => "c++20",
            CppStandard::Cpp23 => "c++latest",
        }
    }
}

impl FromStr for CppStandard {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "11" | "c++11" | "cpp11" | "cxx11" => Ok(CppStandard::Cpp11),
            "14" | "c++14" | "cpp14" | "cxx14" => Ok(CppStandard::Cpp14),
            "17" | "c++17" | "cpp17" | "cxx17" => Ok(CppStandard::Cpp17),
            "20" | "c++20" | "cpp20" | "cxx20" => Ok(CppStandard::Cpp20),
            "23" | "c++23" | "cpp23" | "cxx23" => Ok(CppStandard::Cpp23),
            _ => Err(ConfigError::UnknownLanguage(s.to_string())),
        }
    }
}

/// C standard version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum CStandard {
    C89,
    C99,
    C11,
    C17,
    C23,
}

impl CStandard {
    /// Get the standard as a compiler flag value (e.g., "c11").
    pub fn as_flag_value(&self) -> &'static str {
        match self {
            CStandard::C89 => "c89",
            CStandard::C99 => "c99",
            CStandard::C11 => "c11",
            CStandard::C17 => "c17",
            CStandard::C23 => "c23",
        }
    }
}

impl FromStr for CStandard {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "89" | "c89" | "90" | "c90" => Ok(CStandard::C89),
            "99" | "c99" => Ok(CStandard::C99),
            "11" | "c11" => Ok(CStandard::C11),
            "17" | "c17" | "18" | "c18" => Ok(CStandard::C17),
            "23" | "c23" => Ok(CStandard::C23),
            _ => Err(ConfigError::UnknownLanguage(s.to_string())),
        }
    }
}

/// Either standard, parsed from a loose script string like "c++17" or "c11".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LanguageStandard {
    C(CStandard),
    Cpp(CppStandard),
}

impl FromStr for LanguageStandard {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.to_ascii_lowercase();
        if lower.starts_with("c++") || lower.starts_with("cpp") || lower.starts_with("cxx") {
            Ok(LanguageStandard::Cpp(lower.parse()?))
        } else if lower.starts_with('c') {
            Ok(LanguageStandard::C(lower.parse()?))
        } else {
            Err(ConfigError::UnknownLanguage(s.to_string()))
        }
    }
}
