use core_value::{BasicError, ErrorCode};
use std::collections::HashMap;
use tracing::trace;

/// Abstracts the actual disk so the file-handle table stays testable
/// without touching a real filesystem, the same boundary role
/// `core-config::load_from` plays for its single config file (there it's
/// inlined as a graceful `fs::read_to_string` fallback; here the table
/// needs both read and write, across many open handles, so it goes
/// through a trait instead).
pub trait FileSystem {
    fn read_to_string(&self, name: &str) -> std::io::Result<String>;
    fn write(&self, name: &str, content: &str) -> std::io::Result<()>;
}

pub struct StdFileSystem;

impl FileSystem for StdFileSystem {
    fn read_to_string(&self, name: &str) -> std::io::Result<String> {
        std::fs::read_to_string(name)
    }
    fn write(&self, name: &str, content: &str) -> std::io::Result<()> {
        std::fs::write(name, content)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileMode {
    Input,
    Output,
}

struct OpenFile {
    name: String,
    mode: FileMode,
    lines: Vec<String>,
    pos: usize,
    write_buffer: String,
}

/// Small-positive-integer-keyed table of open files (spec.md §3: "File
/// handle table"). `OUTPUT` handles buffer their writes in memory and
/// flush as one write on `CLOSE` or any program reset.
#[derive(Default)]
pub struct FileTable {
    open: HashMap<i64, OpenFile>,
}

impl FileTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn open(&mut self, fs: &dyn FileSystem, handle: i64, name: &str, mode: FileMode) -> Result<(), BasicError> {
        if self.open.contains_key(&handle) {
            return Err(BasicError::new(ErrorCode::FileMode, format!("file handle #{handle} is already open")));
        }
        let lines = match mode {
            FileMode::Input => {
                let content = fs
                    .read_to_string(name)
                    .map_err(|_| BasicError::new(ErrorCode::FileNotFound, format!("cannot open {name} for INPUT")))?;
                content.lines().map(str::to_string).collect()
            }
            FileMode::Output => Vec::new(),
        };
        trace!(target: "io.files", handle, name, ?mode, "file_open");
        self.open.insert(handle, OpenFile { name: name.to_string(), mode, lines, pos: 0, write_buffer: String::new() });
        Ok(())
    }

    /// Closes `handle`, flushing a buffered `OUTPUT` file as one write.
    pub fn close(&mut self, fs: &dyn FileSystem, handle: i64) -> Result<(), BasicError> {
        let file = self.require(handle)?;
        if file.mode == FileMode::Output {
            fs.write(&file.name, &file.write_buffer)
                .map_err(|_| BasicError::new(ErrorCode::FileNotFound, format!("cannot write {}", file.name)))?;
        }
        trace!(target: "io.files", handle, "file_close");
        self.open.remove(&handle);
        Ok(())
    }

    /// Closes every open handle, discarding write errors: this runs
    /// during program-reset cleanup, where the caller has already
    /// decided to abandon run state regardless.
    pub fn close_all(&mut self, fs: &dyn FileSystem) {
        let handles: Vec<i64> = self.open.keys().copied().collect();
        for handle in handles {
            let _ = self.close(fs, handle);
        }
    }

    pub fn write_line(&mut self, handle: i64, text: &str) -> Result<(), BasicError> {
        let file = self.require_mut(handle)?;
        if file.mode != FileMode::Output {
            return Err(BasicError::new(ErrorCode::FileMode, format!("file handle #{handle} is not open for OUTPUT")));
        }
        file.write_buffer.push_str(text);
        file.write_buffer.push('\n');
        Ok(())
    }

    /// `INPUT #n, var`: the next non-blank line, type-coerced by the
    /// caller. `LINE INPUT #n, var$` should call [`read_raw_line`] instead,
    /// which allows a blank line through.
    pub fn read_line(&mut self, handle: i64) -> Result<String, BasicError> {
        let file = self.require_mut(handle)?;
        while file.pos < file.lines.len() {
            let line = file.lines[file.pos].clone();
            file.pos += 1;
            if !line.trim().is_empty() {
                return Ok(line);
            }
        }
        Err(BasicError::new(ErrorCode::EndOfFile, format!("end of file on handle #{handle}")))
    }

    pub fn read_raw_line(&mut self, handle: i64) -> Result<String, BasicError> {
        let file = self.require_mut(handle)?;
        if file.pos >= file.lines.len() {
            return Err(BasicError::new(ErrorCode::EndOfFile, format!("end of file on handle #{handle}")));
        }
        let line = file.lines[file.pos].clone();
        file.pos += 1;
        Ok(line)
    }

    /// True once every remaining line (if any) is blank.
    pub fn eof(&self, handle: i64) -> Result<bool, BasicError> {
        let file = self.open.get(&handle).ok_or_else(|| BasicError::new(ErrorCode::FileNotFound, format!("file handle #{handle} is not open")))?;
        Ok(file.lines[file.pos..].iter().all(|l| l.trim().is_empty()))
    }

    fn require(&self, handle: i64) -> Result<&OpenFile, BasicError> {
        self.open.get(&handle).ok_or_else(|| BasicError::new(ErrorCode::FileNotFound, format!("file handle #{handle} is not open")))
    }

    fn require_mut(&mut self, handle: i64) -> Result<&mut OpenFile, BasicError> {
        self.open.get_mut(&handle).ok_or_else(|| BasicError::new(ErrorCode::FileNotFound, format!("file handle #{handle} is not open")))
    }
}

/// `LOAD`/`SAVE` file-name normalization: append `.bas` when the name has
/// no extension, and strip non-printable bytes (spec.md §6).
pub fn normalize_program_filename(name: &str) -> String {
    let cleaned: String = name.chars().filter(|c| !c.is_control()).collect();
    if cleaned.contains('.') {
        cleaned
    } else {
        format!("{cleaned}.bas")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::collections::HashMap as StdMap;

    #[derive(Default)]
    struct MemFs {
        files: RefCell<StdMap<String, String>>,
    }

    impl FileSystem for MemFs {
        fn read_to_string(&self, name: &str) -> std::io::Result<String> {
            self.files
                .borrow()
                .get(name)
                .cloned()
                .ok_or_else(|| std::io::Error::new(std::io::ErrorKind::NotFound, "not found"))
        }
        fn write(&self, name: &str, content: &str) -> std::io::Result<()> {
            self.files.borrow_mut().insert(name.to_string(), content.to_string());
            Ok(())
        }
    }

    #[test]
    fn output_file_buffers_and_flushes_on_close() {
        let fs = MemFs::default();
        let mut table = FileTable::new();
        table.open(&fs, 1, "out.txt", FileMode::Output).unwrap();
        table.write_line(1, "HELLO").unwrap();
        table.write_line(1, "WORLD").unwrap();
        assert!(fs.files.borrow().get("out.txt").is_none());
        table.close(&fs, 1).unwrap();
        assert_eq!(fs.files.borrow().get("out.txt").unwrap(), "HELLO\nWORLD\n");
    }

    #[test]
    fn input_read_line_skips_blank_lines() {
        let fs = MemFs::default();
        fs.write("in.txt", "A\n\nB\n").unwrap();
        let mut table = FileTable::new();
        table.open(&fs, 2, "in.txt", FileMode::Input).unwrap();
        assert_eq!(table.read_line(2).unwrap(), "A");
        assert_eq!(table.read_line(2).unwrap(), "B");
        assert!(table.read_line(2).is_err());
    }

    #[test]
    fn eof_is_true_when_all_remaining_lines_are_blank() {
        let fs = MemFs::default();
        fs.write("in.txt", "A\n\n\n").unwrap();
        let mut table = FileTable::new();
        table.open(&fs, 3, "in.txt", FileMode::Input).unwrap();
        assert!(!table.eof(3).unwrap());
        table.read_line(3).unwrap();
        assert!(table.eof(3).unwrap());
    }

    #[test]
    fn opening_an_already_open_handle_is_a_file_mode_error() {
        let fs = MemFs::default();
        fs.write("in.txt", "A\n").unwrap();
        let mut table = FileTable::new();
        table.open(&fs, 4, "in.txt", FileMode::Input).unwrap();
        assert!(matches!(table.open(&fs, 4, "in.txt", FileMode::Input), Err(e) if e.code == ErrorCode::FileMode));
    }

    #[test]
    fn normalize_filename_appends_bas_when_no_extension() {
        assert_eq!(normalize_program_filename("GAME"), "GAME.bas");
        assert_eq!(normalize_program_filename("game.bas"), "game.bas");
    }
}
