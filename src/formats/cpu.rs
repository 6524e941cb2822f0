//! CPU type and file type naming tables.

use crate::types::Width;

/// Mach-O CPU type constants.
pub mod cpu_type {
    pub const VAX: u32 = 1;
    pub const MC680X0: u32 = 6;
    pub const X86: u32 = 7;
    pub const X86_64: u32 = 0x01000007;
    pub const MC98000: u32 = 10;
    pub const HPPA: u32 = 11;
    pub const ARM: u32 = 12;
    pub const ARM64: u32 = 0x0100000C;
    pub const ARM64_32: u32 = 0x0200000C;
    pub const MC88000: u32 = 13;
    pub const SPARC: u32 = 14;
    pub const I860: u32 = 15;
    pub const POWERPC: u32 = 18;
    pub const POWERPC64: u32 = 0x01000012;

    /// CPU_ARCH_ABI64 flag
    pub const ABI64: u32 = 0x01000000;
    /// CPU_ARCH_ABI64_32 (ILP32) flag
    pub const ABI64_32: u32 = 0x02000000;
}

/// Mach-O ARM subtypes.
pub mod arm_subtype {
    pub const ALL: u32 = 0;
    pub const V4T: u32 = 5;
    pub const V6: u32 = 6;
    pub const V5TEJ: u32 = 7;
    pub const XSCALE: u32 = 8;
    pub const V7: u32 = 9;
    pub const V7F: u32 = 10;
    pub const V7S: u32 = 11;
    pub const V7K: u32 = 12;
    pub const V8: u32 = 13;
    pub const V6M: u32 = 14;
    pub const V7M: u32 = 15;
    pub const V7EM: u32 = 16;
}

/// Mach-O ARM64 subtypes.
pub mod arm64_subtype {
    pub const ALL: u32 = 0;
    pub const V8: u32 = 1;
    /// ARMv8.3+ with pointer authentication
    pub const E: u32 = 2;
}

/// Mach-O x86_64 subtypes.
pub mod x86_64_subtype {
    pub const ALL: u32 = 3;
    pub const H: u32 = 8;
}

/// Mach-O file types.
pub mod file_type {
    pub const OBJECT: u32 = 0x1;
    pub const EXECUTE: u32 = 0x2;
    pub const FVMLIB: u32 = 0x3;
    pub const CORE: u32 = 0x4;
    pub const PRELOAD: u32 = 0x5;
    pub const DYLIB: u32 = 0x6;
    pub const DYLINKER: u32 = 0x7;
    pub const BUNDLE: u32 = 0x8;
    pub const DYLIB_STUB: u32 = 0x9;
    pub const DSYM: u32 = 0xA;
    pub const KEXT_BUNDLE: u32 = 0xB;
    pub const FILESET: u32 = 0xC;
}

/// Mask for the capability bits in the high byte of a CPU subtype.
const SUBTYPE_MASK: u32 = 0x00FF_FFFF;

/// Header width implied by a CPU type's ABI64 bit.
pub fn width_for_cpu_type(cputype: u32) -> Width {
    if cputype & cpu_type::ABI64 == 0 {
        Width::Bits32
    } else {
        Width::Bits64
    }
}

/// Short architecture name as used by `lipo` (e.g. `arm64e`, `armv7s`).
pub fn cpu_type_name(cputype: u32, cpusubtype: u32) -> &'static str {
    let subtype = cpusubtype & SUBTYPE_MASK;

    match cputype {
        cpu_type::ARM64 => match subtype {
            arm64_subtype::E => "arm64e",
            arm64_subtype::V8 => "arm64v8",
            _ => "arm64",
        },
        cpu_type::ARM64_32 => "arm64_32",
        cpu_type::ARM => match subtype {
            arm_subtype::V4T => "armv4t",
            arm_subtype::V5TEJ => "armv5",
            arm_subtype::V6 => "armv6",
            arm_subtype::V6M => "armv6m",
            arm_subtype::XSCALE => "xscale",
            arm_subtype::V7 => "armv7",
            arm_subtype::V7F => "armv7f",
            arm_subtype::V7S => "armv7s",
            arm_subtype::V7K => "armv7k",
            arm_subtype::V7M => "armv7m",
            arm_subtype::V7EM => "armv7em",
            arm_subtype::V8 => "armv8",
            _ => "arm",
        },
        cpu_type::X86_64 => match subtype {
            x86_64_subtype::H => "x86_64h",
            _ => "x86_64",
        },
        cpu_type::X86 => "i386",
        cpu_type::POWERPC => "ppc",
        cpu_type::POWERPC64 => "ppc64",
        cpu_type::MC680X0 => "m68k",
        cpu_type::MC88000 => "m88k",
        cpu_type::HPPA => "hppa",
        cpu_type::SPARC => "sparc",
        cpu_type::I860 => "i860",
        cpu_type::VAX => "vax",
        _ => "unknown",
    }
}

/// Human-readable description of a CPU type.
pub fn cpu_type_description(cputype: u32) -> &'static str {
    match cputype {
        cpu_type::VAX => "DEC VAX",
        cpu_type::MC680X0 => "Motorola 68000",
        cpu_type::X86 => "Intel x86",
        cpu_type::X86_64 => "Intel x86-64",
        cpu_type::MC98000 => "Motorola MC98000",
        cpu_type::HPPA => "HP PA-RISC",
        cpu_type::ARM => "ARM",
        cpu_type::ARM64 => "ARM64 / AArch64",
        cpu_type::ARM64_32 => "ARM64_32 (ILP32)",
        cpu_type::MC88000 => "Motorola MC88000",
        cpu_type::SPARC => "SPARC",
        cpu_type::I860 => "Intel i860",
        cpu_type::POWERPC => "PowerPC",
        cpu_type::POWERPC64 => "PowerPC 64-bit",
        _ => "Unknown CPU type",
    }
}

/// `MH_*` name of a file type.
pub fn file_type_name(filetype: u32) -> &'static str {
    match filetype {
        file_type::OBJECT => "MH_OBJECT",
        file_type::EXECUTE => "MH_EXECUTE",
        file_type::FVMLIB => "MH_FVMLIB",
        file_type::CORE => "MH_CORE",
        file_type::PRELOAD => "MH_PRELOAD",
        file_type::DYLIB => "MH_DYLIB",
        file_type::DYLINKER => "MH_DYLINKER",
        file_type::BUNDLE => "MH_BUNDLE",
        file_type::DYLIB_STUB => "MH_DYLIB_STUB",
        file_type::DSYM => "MH_DSYM",
        file_type::KEXT_BUNDLE => "MH_KEXT_BUNDLE",
        file_type::FILESET => "MH_FILESET",
        _ => "MH_UNKNOWN",
    }
}
