//! PTX laser scan format support
//!
//! A PTX source is a sequence of frames. Each frame is a 10 line header
//! followed by `rows * cols` data lines:
//!
//! ```text
//! rows
//! cols
//! st1 st2 st3          scanner registered position
//! sx1 sx2 sx3          scanner registered axis X
//! sy1 sy2 sy3          scanner registered axis Y
//! sz1 sz2 sz3          scanner registered axis Z
//! r11 r21 r31 0        cloud pose, column 0
//! r12 r22 r32 0        cloud pose, column 1
//! r13 r23 r33 0        cloud pose, column 2
//! tr1 tr2 tr3 1        cloud pose, column 3
//! x y z [i [r g b]]    one line per point, row-major
//! ```
//!
//! Scan files are often cut short in the field, so reading is best effort:
//! the first header or data failure ends the read, every frame completed
//! before it is kept, and the failure is reported rather than returned.

use itertools::Itertools;
use log::{debug, info, warn};
use scanmerge_core::{
    ColoredIntensityPoint3f, Error, IntensityPoint3f, Point3f, PointCloud, PointLayout, Pose,
    Result, ScanCloud, ScanFrame, ScanRecord,
};
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

/// Widest record layout, in tokens
const MAX_TOKENS: usize = 7;

/// Upper bound on the up-front allocation for one frame
const MAX_PREALLOCATED_POINTS: usize = 1 << 20;

/// Data rows between progress messages
const PROGRESS_INTERVAL: usize = 1_000_000;

/// Frame header: grid shape and the two poses
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PtxHeader {
    pub rows: usize,
    pub cols: usize,
    pub scanner_pose: Pose,
    pub cloud_pose: Pose,
}

impl PtxHeader {
    /// Number of data lines that follow the header
    pub fn point_count(&self) -> Option<usize> {
        self.rows.checked_mul(self.cols)
    }
}

/// Options for reading PTX sources
#[derive(Debug, Clone, Copy, Default)]
pub struct PtxReadOptions {
    /// Move each frame's points into the shared reference frame with its cloud pose
    pub transform: bool,
}

impl PtxReadOptions {
    pub fn with_transform(mut self, transform: bool) -> Self {
        self.transform = transform;
        self
    }
}

/// Result of reading a whole PTX source
#[derive(Debug)]
pub struct PtxScan {
    /// Frames in source order
    pub frames: Vec<ScanFrame>,
    /// Why reading stopped before the end of the source, if it did
    pub stop_reason: Option<Error>,
}

impl PtxScan {
    /// Whether every frame in the source was read
    pub fn is_complete(&self) -> bool {
        self.stop_reason.is_none()
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Flatten and concatenate all frame clouds in order.
    ///
    /// Read with [`PtxReadOptions::transform`] for the result to share one
    /// reference frame.
    pub fn merged(self) -> Result<ScanCloud> {
        ScanCloud::concatenate(self.frames.into_iter().map(|f| f.cloud.flatten()).collect())
    }
}

/// Line source that remembers the current line and its number
struct LineCursor<R> {
    reader: R,
    buf: String,
    line: usize,
}

impl<R: BufRead> LineCursor<R> {
    fn new(reader: R) -> Self {
        Self {
            reader,
            buf: String::new(),
            line: 0,
        }
    }

    /// Advance; `false` at end of input
    fn advance(&mut self) -> Result<bool> {
        self.buf.clear();
        let n = self.reader.read_line(&mut self.buf)?;
        if n == 0 {
            return Ok(false);
        }
        self.line += 1;
        Ok(true)
    }

    fn current(&self) -> &str {
        self.buf.trim()
    }

    /// Advance or fail with `TruncatedSource` naming what was expected
    fn expect_line(&mut self, what: &str) -> Result<&str> {
        if !self.advance()? {
            return Err(Error::TruncatedSource(format!(
                "expected {} after line {}",
                what, self.line
            )));
        }
        Ok(self.current())
    }

    fn malformed(&self, reason: impl Into<String>) -> Error {
        Error::MalformedRow {
            line: self.line,
            reason: reason.into(),
        }
    }
}

/// Split `line` into at most `MAX_TOKENS` tokens; `None` if there are more.
fn split_tokens(line: &str) -> Option<([&str; MAX_TOKENS], usize)> {
    let mut tokens = [""; MAX_TOKENS];
    let mut count = 0;
    for token in line.split_whitespace() {
        if count == MAX_TOKENS {
            return None;
        }
        tokens[count] = token;
        count += 1;
    }
    Some((tokens, count))
}

fn parse_floats<const N: usize>(line: &str) -> std::result::Result<[f64; N], String> {
    let tokens: Vec<&str> = line.split_whitespace().collect();
    if tokens.len() != N {
        return Err(format!("expected {} values, found {}", N, tokens.len()));
    }
    let mut values = [0.0; N];
    for (value, token) in values.iter_mut().zip(tokens) {
        *value = token
            .parse::<f64>()
            .map_err(|_| format!("invalid number '{}'", token))?;
    }
    Ok(values)
}

/// Streaming PTX reader.
///
/// Iterating yields frames until the source ends or the first failure; the
/// failure is then available from [`PtxReader::stop_reason`].
pub struct PtxReader<R> {
    cursor: LineCursor<R>,
    options: PtxReadOptions,
    stop_reason: Option<Error>,
    finished: bool,
    frames_read: usize,
}

impl PtxReader<BufReader<File>> {
    /// Open a PTX file
    pub fn open<P: AsRef<Path>>(path: P, options: PtxReadOptions) -> Result<Self> {
        let file = File::open(path)?;
        Ok(Self::new(BufReader::new(file), options))
    }
}

impl<R: BufRead> PtxReader<R> {
    pub fn new(reader: R, options: PtxReadOptions) -> Self {
        Self {
            cursor: LineCursor::new(reader),
            options,
            stop_reason: None,
            finished: false,
            frames_read: 0,
        }
    }

    /// Failure that ended the read, if any
    pub fn stop_reason(&self) -> Option<&Error> {
        self.stop_reason.as_ref()
    }

    /// Take the failure that ended the read
    pub fn take_stop_reason(&mut self) -> Option<Error> {
        self.stop_reason.take()
    }

    /// Read the next frame header.
    ///
    /// `Ok(None)` means the source ended cleanly between frames. Blank lines
    /// before a header are skipped.
    pub fn read_header(&mut self) -> Result<Option<PtxHeader>> {
        loop {
            if !self.cursor.advance()? {
                return Ok(None);
            }
            if !self.cursor.current().is_empty() {
                break;
            }
        }
        let rows = self.parse_count("row count")?;
        self.cursor.expect_line("column count")?;
        let cols = self.parse_count("column count")?;

        let mut scanner_rows = [[0.0; 3]; 4];
        for (i, row) in scanner_rows.iter_mut().enumerate() {
            let line = self.cursor.expect_line("scanner pose")?;
            *row = parse_floats::<3>(line)
                .map_err(|e| self.cursor.malformed(format!("scanner pose row {}: {}", i, e)))?;
        }

        let mut cloud_columns = [[0.0; 4]; 4];
        for (j, column) in cloud_columns.iter_mut().enumerate() {
            let line = self.cursor.expect_line("cloud pose")?;
            *column = parse_floats::<4>(line)
                .map_err(|e| self.cursor.malformed(format!("cloud pose column {}: {}", j, e)))?;
        }

        let header = PtxHeader {
            rows,
            cols,
            scanner_pose: Pose::from_scanner_rows(scanner_rows),
            cloud_pose: Pose::from_columns(cloud_columns),
        };
        debug!(
            "PTX header at line {}: shape {}x{}, scanner pose {:?}, cloud pose {:?}",
            self.cursor.line, rows, cols, header.scanner_pose.matrix, header.cloud_pose.matrix
        );
        Ok(Some(header))
    }

    fn parse_count(&self, what: &str) -> Result<usize> {
        let line = self.cursor.current();
        line.parse::<usize>()
            .map_err(|_| self.cursor.malformed(format!("invalid {} '{}'", what, line)))
    }

    /// Read one full frame; `Ok(None)` at a clean end of input.
    fn read_frame(&mut self) -> Result<Option<ScanFrame>> {
        let header = match self.read_header()? {
            Some(header) => header,
            None => return Ok(None),
        };
        let count = header
            .point_count()
            .ok_or_else(|| self.cursor.malformed("frame shape overflows"))?;
        if count == 0 {
            return Err(self.cursor.malformed(format!(
                "frame has no data rows ({}x{})",
                header.rows, header.cols
            )));
        }

        // The first data row fixes the layout for the whole frame.
        self.cursor.expect_line("first data row")?;
        let width = self.cursor.current().split_whitespace().count();
        let layout = PointLayout::from_width(width)
            .map_err(|e| self.cursor.malformed(e.to_string()))?;
        debug!("PTX frame {} layout: {}", self.frames_read, layout);

        let cloud = match layout {
            PointLayout::Xyz => ScanCloud::Xyz(self.read_records::<Point3f>(&header, count)?),
            PointLayout::XyzIntensity => {
                ScanCloud::XyzIntensity(self.read_records::<IntensityPoint3f>(&header, count)?)
            }
            PointLayout::XyzIntensityRgb => ScanCloud::XyzIntensityRgb(
                self.read_records::<ColoredIntensityPoint3f>(&header, count)?,
            ),
        };

        let mut frame = ScanFrame::new(header.scanner_pose, header.cloud_pose, cloud);
        if self.options.transform {
            frame.align();
        }
        Ok(Some(frame))
    }

    /// Decode `count` records, the first of which is the current line.
    fn read_records<T: ScanRecord>(
        &mut self,
        header: &PtxHeader,
        count: usize,
    ) -> Result<PointCloud<T>> {
        let mut points = Vec::with_capacity(count.min(MAX_PREALLOCATED_POINTS));
        points.push(self.parse_record::<T>()?);
        for i in 1..count {
            if i % PROGRESS_INTERVAL == 0 {
                debug!("{} points read", i);
            }
            self.cursor.expect_line("data row")?;
            points.push(self.parse_record::<T>()?);
        }
        PointCloud::from_grid(points, header.rows, header.cols)
    }

    fn parse_record<T: ScanRecord>(&self) -> Result<T> {
        let (tokens, count) = split_tokens(self.cursor.current())
            .ok_or_else(|| self.cursor.malformed("too many values"))?;
        if count != T::WIDTH {
            return Err(self.cursor.malformed(format!(
                "expected {} values like the first row, found {}",
                T::WIDTH,
                count
            )));
        }
        T::parse_tokens(&tokens[..count]).map_err(|reason| self.cursor.malformed(reason))
    }

    /// Read all remaining frames
    pub fn read_all(mut self) -> PtxScan {
        let frames: Vec<ScanFrame> = self.by_ref().collect();
        PtxScan {
            frames,
            stop_reason: self.stop_reason.take(),
        }
    }
}

impl<R: BufRead> Iterator for PtxReader<R> {
    type Item = ScanFrame;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }
        match self.read_frame() {
            Ok(Some(frame)) => {
                self.frames_read += 1;
                Some(frame)
            }
            Ok(None) => {
                self.finished = true;
                None
            }
            Err(e) => {
                warn!(
                    "PTX read stopped after {} frame(s): {}",
                    self.frames_read, e
                );
                self.stop_reason = Some(e);
                self.finished = true;
                None
            }
        }
    }
}

/// Read every frame of a PTX file.
///
/// Only failing to open the file is an error; malformed or truncated content
/// ends the read with the frames parsed so far.
pub fn read_ptx<P: AsRef<Path>>(path: P, options: PtxReadOptions) -> Result<PtxScan> {
    let path = path.as_ref();
    let scan = PtxReader::open(path, options)?.read_all();
    info!("{}: {} frame(s) read", path.display(), scan.len());
    Ok(scan)
}

/// Read a PTX file with every frame aligned to the reference frame and merged
/// into a single flat cloud.
pub fn read_ptx_merged<P: AsRef<Path>>(path: P) -> Result<ScanCloud> {
    let scan = read_ptx(path, PtxReadOptions::default().with_transform(true))?;
    scan.merged()
}

/// Read only the first frame header of a PTX file
pub fn read_ptx_header<P: AsRef<Path>>(path: P) -> Result<PtxHeader> {
    let path = path.as_ref();
    PtxReader::open(path, PtxReadOptions::default())?
        .read_header()?
        .ok_or_else(|| Error::TruncatedSource(format!("{} holds no frame", path.display())))
}

fn format_values(values: &[f64]) -> String {
    values.iter().map(|v| format!("{:.6}", v)).join(" ")
}

/// PTX writer; frames are appended in call order.
pub struct PtxWriter<W: Write> {
    writer: W,
    line: String,
}

impl PtxWriter<BufWriter<File>> {
    /// Create (truncate) a PTX file
    pub fn create<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::create(path)?;
        Ok(Self::new(BufWriter::new(file)))
    }
}

impl<W: Write> PtxWriter<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer,
            line: String::new(),
        }
    }

    /// Write one frame. Flat clouds are written as `len` rows of one column.
    pub fn write_frame(&mut self, frame: &ScanFrame) -> Result<()> {
        let (rows, cols) = match frame.cloud.grid() {
            Some(grid) => (grid.rows, grid.cols),
            None => (frame.cloud.len(), 1),
        };
        writeln!(self.writer, "{}", rows)?;
        writeln!(self.writer, "{}", cols)?;
        for row in frame.scanner_pose.scanner_rows() {
            writeln!(self.writer, "{}", format_values(&row))?;
        }
        for column in frame.cloud_pose.columns() {
            writeln!(self.writer, "{}", format_values(&column))?;
        }
        scanmerge_core::visit_scan_cloud!(&frame.cloud, c => self.write_records(&c.points))
    }

    /// Write a bare cloud as one frame with identity poses
    pub fn write_cloud(&mut self, cloud: &ScanCloud) -> Result<()> {
        self.write_frame(&ScanFrame::from_cloud(cloud.clone()))
    }

    fn write_records<T: ScanRecord>(&mut self, records: &[T]) -> Result<()> {
        for record in records {
            self.line.clear();
            record
                .write_tokens(&mut self.line)
                .map_err(|_| Error::Io(std::io::Error::other("failed to format record")))?;
            self.line.push('\n');
            self.writer.write_all(self.line.as_bytes())?;
        }
        Ok(())
    }

    /// Flush and return the underlying writer
    pub fn finish(mut self) -> Result<W> {
        self.writer.flush()?;
        Ok(self.writer)
    }
}

/// Write frames to a PTX file
pub fn write_ptx<P: AsRef<Path>>(path: P, frames: &[ScanFrame]) -> Result<()> {
    let path = path.as_ref();
    let mut writer = PtxWriter::create(path)?;
    for frame in frames {
        writer.write_frame(frame)?;
    }
    writer.finish()?;
    info!("{}: {} frame(s) written", path.display(), frames.len());
    Ok(())
}
