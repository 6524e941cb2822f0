//! Output formatters for parsed Mach-O files.
//!
//! This module provides trait-based formatters for rendering a [`Report`]
//! in various output formats (human-readable, JSON, compact).

use serde::Serialize;
use std::io::{Read, Seek};
use std::path::Path;

use crate::cursor::ByteCursor;
use crate::error::Result;
use crate::formats::{read_stream_with_options, FatHeader, LoadCommand, MachFile, MachHeader};
use crate::types::{HeaderFlags, ParseOptions};

/// Everything the formatters show for one file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Report {
    /// Fat header, for universal binaries
    pub fat: Option<FatHeader>,
    /// Parsed images, in architecture order
    pub images: Vec<MachHeader>,
}

impl Report {
    /// Parse the file at the cursor, keeping only images named `arch` if given.
    ///
    /// Fat slices that do not match `arch` are never parsed.
    pub fn read<R: Read + Seek>(
        cursor: &mut ByteCursor<R>,
        options: &ParseOptions,
        arch: Option<&str>,
    ) -> Result<Self> {
        let wanted = |name: &str| arch.map_or(true, |a| a == name);

        match read_stream_with_options(cursor, options)? {
            MachFile::Fat(fat) => {
                let mut images = Vec::new();
                for entry in fat.arches.iter().filter(|a| wanted(a.arch_name())) {
                    images.push(fat.read_macho(entry, cursor, options)?);
                }
                Ok(Self {
                    fat: Some(fat),
                    images,
                })
            }
            MachFile::MachO(header) => {
                let images = if wanted(header.cpu_name()) {
                    vec![header]
                } else {
                    Vec::new()
                };
                Ok(Self { fat: None, images })
            }
        }
    }
}

/// Trait for formatting reports.
///
/// Implementors provide methods for rendering each component of a report,
/// plus a method to render the complete report.
pub trait ReportFormatter {
    /// Format the file path header.
    fn format_file(&self, path: &Path) -> String;

    /// Format the fat architecture table.
    fn format_container(&self, fat: &FatHeader) -> Option<String>;

    /// Format one Mach-O image.
    fn format_image(&self, header: &MachHeader) -> Option<String>;

    /// Format the complete report.
    ///
    /// Default implementation concatenates all component outputs.
    fn format_report(&self, report: &Report, path: &Path) -> String {
        let mut parts = vec![self.format_file(path)];

        if let Some(s) = report.fat.as_ref().and_then(|f| self.format_container(f)) {
            parts.push(s);
        }
        parts.extend(report.images.iter().filter_map(|h| self.format_image(h)));

        parts.join("")
    }
}

/// Render header flags as `NOUNDEFS | DYLDLINK | ...`.
pub fn flag_names(flags: HeaderFlags) -> String {
    let mut s = String::new();
    if bitflags::parser::to_writer(&flags, &mut s).is_err() || s.is_empty() {
        return format!("0x{:08X}", flags.bits());
    }
    s
}

/// Human-readable output formatter.
#[derive(Debug, Clone, Default)]
pub struct HumanFormatter {
    /// Show verbose output (sections and every load command)
    pub verbose: bool,
    /// Quiet mode (minimal output)
    pub quiet: bool,
}

impl HumanFormatter {
    /// Create a new human formatter with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a verbose formatter.
    pub fn verbose() -> Self {
        Self {
            verbose: true,
            quiet: false,
        }
    }

    /// Create a quiet formatter.
    pub fn quiet() -> Self {
        Self {
            verbose: false,
            quiet: true,
        }
    }

    fn format_segments(&self, header: &MachHeader, s: &mut String) {
        let segments = header.segments();
        if segments.is_empty() {
            return;
        }
        s.push_str("  Segments:\n");
        for seg in segments {
            s.push_str(&format!(
                "    {:16} 0x{:012X}  size 0x{:X}  {}/{}  {} section(s)\n",
                seg.segname, seg.vmaddr, seg.vmsize, seg.initprot, seg.maxprot, seg.nsects
            ));
            if self.verbose {
                for sect in &seg.sections {
                    s.push_str(&format!(
                        "      {:32} 0x{:012X}  size 0x{:X}\n",
                        sect.full_name(),
                        sect.addr,
                        sect.size
                    ));
                }
            }
        }
    }
}

impl ReportFormatter for HumanFormatter {
    fn format_file(&self, path: &Path) -> String {
        if self.quiet {
            String::new()
        } else {
            format!("File: {}\n", path.display())
        }
    }

    fn format_container(&self, fat: &FatHeader) -> Option<String> {
        if self.quiet {
            return None;
        }
        let mut s = format!("  Container:  fat ({} architectures)\n", fat.nfat_arch);
        for (i, arch) in fat.arches.iter().enumerate() {
            s.push_str(&format!(
                "    [{}] {:8} offset 0x{:X}  size {}  align 2^{}\n",
                i,
                arch.arch_name(),
                arch.offset,
                arch.size,
                arch.align
            ));
        }
        Some(s)
    }

    fn format_image(&self, header: &MachHeader) -> Option<String> {
        if self.quiet {
            return None;
        }

        let mut s = String::new();
        s.push_str(&format!(
            "Image: {} ({}) at 0x{:X}\n",
            header.cpu_name(),
            header.width,
            header.offset
        ));
        s.push_str(&format!("  File type:  {}\n", header.file_type_name()));
        s.push_str(&format!(
            "  CPU:        {} ({})\n",
            header.cpu_name(),
            header.cpu_description()
        ));
        s.push_str(&format!("  Flags:      {}\n", flag_names(header.flags)));
        s.push_str(&format!(
            "  Commands:   {} ({} bytes)\n",
            header.ncmds, header.sizeofcmds
        ));
        s.push_str(&format!(
            "  Encrypted:  {}\n",
            if header.is_encrypted() { "yes" } else { "no" }
        ));
        match header.code_signature_range() {
            Some(range) => s.push_str(&format!("  Signature:  {}\n", range)),
            None => s.push_str("  Signature:  none\n"),
        }
        if let Some(id) = header.dylib_id() {
            s.push_str(&format!("  Install name: {}\n", id));
        }

        let libraries = header.loaded_libraries();
        if !libraries.is_empty() {
            s.push_str("  Libraries:\n");
            for dylib in header.dylib_commands() {
                s.push_str(&format!(
                    "    {} ({})\n",
                    dylib.name, dylib.dylib.current_version
                ));
            }
        }

        let rpaths = header.run_paths();
        if !rpaths.is_empty() {
            s.push_str(&format!("  Run paths:  {}\n", rpaths.join(", ")));
        }

        self.format_segments(header, &mut s);

        if self.verbose {
            s.push_str(&format!(
                "  Load commands: ({} undecoded)\n",
                undecoded_commands(header)
            ));
            for (i, cmd) in header.load_commands.iter().enumerate() {
                s.push_str(&format!("    [{:2}] {} ({} bytes)\n", i, cmd.kind(), cmd.cmdsize()));
            }
        }

        s.push('\n');
        Some(s)
    }

    fn format_report(&self, report: &Report, path: &Path) -> String {
        if self.quiet {
            // Quiet mode: just "path: arch, arch"
            let names: Vec<&str> = report.images.iter().map(MachHeader::cpu_name).collect();
            return format!("{}: {}\n", path.display(), names.join(", "));
        }

        let mut parts = vec![self.format_file(path)];
        if let Some(s) = report.fat.as_ref().and_then(|f| self.format_container(f)) {
            parts.push(s);
        }
        parts.extend(report.images.iter().filter_map(|h| self.format_image(h)));
        parts.join("")
    }
}

/// JSON output formatter.
#[derive(Debug, Clone)]
pub struct JsonFormatter {
    /// Pretty-print JSON
    pub pretty: bool,
}

impl Default for JsonFormatter {
    fn default() -> Self {
        Self { pretty: true }
    }
}

impl JsonFormatter {
    /// Create a new JSON formatter with pretty printing.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a compact JSON formatter.
    pub fn compact() -> Self {
        Self { pretty: false }
    }
}

impl ReportFormatter for JsonFormatter {
    fn format_file(&self, _path: &Path) -> String {
        String::new() // Handled in format_report
    }

    fn format_container(&self, _fat: &FatHeader) -> Option<String> {
        None
    }

    fn format_image(&self, _header: &MachHeader) -> Option<String> {
        None
    }

    fn format_report(&self, report: &Report, path: &Path) -> String {
        #[derive(Serialize)]
        struct JsonOutput<'a> {
            file: String,
            fat: Option<&'a FatHeader>,
            images: Vec<ImageJson<'a>>,
        }

        #[derive(Serialize)]
        struct ImageJson<'a> {
            arch: &'static str,
            file_type: &'static str,
            encrypted: bool,
            loaded_libraries: Vec<&'a str>,
            run_paths: Vec<&'a str>,
            dylib_id: Option<&'a str>,
            code_signature: Option<crate::types::ByteRange>,
            header: &'a MachHeader,
        }

        let output = JsonOutput {
            file: path.display().to_string(),
            fat: report.fat.as_ref(),
            images: report
                .images
                .iter()
                .map(|h| ImageJson {
                    arch: h.cpu_name(),
                    file_type: h.file_type_name(),
                    encrypted: h.is_encrypted(),
                    loaded_libraries: h.loaded_libraries(),
                    run_paths: h.run_paths(),
                    dylib_id: h.dylib_id(),
                    code_signature: h.code_signature_range(),
                    header: h,
                })
                .collect(),
        };

        if self.pretty {
            serde_json::to_string_pretty(&output).unwrap_or_else(|_| "{}".to_string())
        } else {
            serde_json::to_string(&output).unwrap_or_else(|_| "{}".to_string())
        }
    }
}

/// Compact output formatter: one line per image.
#[derive(Debug, Clone, Default)]
pub struct ShortFormatter;

impl ShortFormatter {
    /// Create a new short formatter.
    pub fn new() -> Self {
        Self
    }
}

impl ReportFormatter for ShortFormatter {
    fn format_file(&self, _path: &Path) -> String {
        String::new() // Handled in format_report
    }

    fn format_container(&self, _fat: &FatHeader) -> Option<String> {
        None
    }

    fn format_image(&self, header: &MachHeader) -> Option<String> {
        let signature = header
            .code_signature_range()
            .map_or_else(|| "-".to_string(), |r| format!("0x{:X}+{}", r.offset, r.size));
        Some(format!(
            "{}\t{}\t{}\t{}\t{}",
            header.cpu_name(),
            header.file_type_name(),
            header.load_commands.len(),
            if header.is_encrypted() { "encrypted" } else { "plain" },
            signature
        ))
    }

    fn format_report(&self, report: &Report, path: &Path) -> String {
        let mut s = String::new();
        for line in report.images.iter().filter_map(|h| self.format_image(h)) {
            s.push_str(&format!("{}\t{}\n", path.display(), line));
        }
        s
    }
}

/// Count of load commands that had no dedicated reader.
pub fn undecoded_commands(header: &MachHeader) -> usize {
    header
        .load_commands
        .iter()
        .filter(|c| matches!(c, LoadCommand::Undefined(_)))
        .count()
}
