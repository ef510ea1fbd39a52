//! Whitespace-separated `x y z` point files.
//!
//! One point per line. Blank lines and anything after `#` are ignored. A
//! filament file lists its spine vertices in order.

use std::fs::{self, File};
use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::path::Path;

use thiserror::Error;

use crate::geom::{FilamentSpine, GeometryError, Point3};
use crate::index::TracerRecord;

pub type ParseResult<T> = Result<T, ParseError>;

#[derive(Debug, Error)]
pub enum ParseError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("line {line}: invalid number `{token}`")]
    Number { line: usize, token: String },
    #[error("line {line}: expected 3 columns (x y z), found {found}")]
    Columns { line: usize, found: usize },
    #[error("invalid polyline: {0}")]
    Geometry(#[from] GeometryError),
}

/// Reads points from any buffered source.
///
/// # Errors
/// [`ParseError::Columns`] for a line without exactly three values,
/// [`ParseError::Number`] for a token that is not a float, and
/// [`ParseError::Io`] for read failures.
pub fn read_points<R: BufRead>(reader: R) -> ParseResult<Vec<Point3>> {
    let mut points = Vec::new();
    for (index, line) in reader.lines().enumerate() {
        let line = line?;
        let line_no = index + 1;
        let content = line.split('#').next().unwrap_or_default().trim();
        if content.is_empty() {
            continue;
        }

        let tokens: Vec<&str> = content.split_whitespace().collect();
        if tokens.len() != 3 {
            return Err(ParseError::Columns {
                line: line_no,
                found: tokens.len(),
            });
        }
        let mut coords = [0.0; 3];
        for (slot, token) in coords.iter_mut().zip(&tokens) {
            *slot = token.parse().map_err(|_| ParseError::Number {
                line: line_no,
                token: (*token).to_owned(),
            })?;
        }
        points.push(Point3::from_array(coords));
    }
    Ok(points)
}

/// Reads a tracer catalog from `path`.
///
/// # Errors
/// See [`read_points`].
pub fn load_points(path: impl AsRef<Path>) -> ParseResult<Vec<Point3>> {
    let path = path.as_ref();
    let points = read_points(BufReader::new(File::open(path)?))?;
    log::debug!("read {} points from {}", points.len(), path.display());
    Ok(points)
}

/// Reads one filament spine from `path`.
///
/// # Errors
/// See [`read_points`], plus [`ParseError::Geometry`] when the vertices do
/// not form a valid spine.
pub fn load_polyline(path: impl AsRef<Path>) -> ParseResult<FilamentSpine> {
    Ok(FilamentSpine::new(load_points(path)?)?)
}

/// Writes points as `x y z` lines with eight decimals, creating parent
/// directories as needed.
///
/// # Errors
/// [`ParseError::Io`] on any write failure.
pub fn write_points(path: impl AsRef<Path>, points: &[Point3]) -> ParseResult<()> {
    let mut out = create(path.as_ref())?;
    for p in points {
        writeln!(out, "{:.8} {:.8} {:.8}", p.x, p.y, p.z)?;
    }
    out.flush()?;
    Ok(())
}

/// Writes tracer records as a tab-separated table with a header row.
///
/// # Errors
/// [`ParseError::Io`] on any write failure.
pub fn write_records<W: Write>(mut out: W, records: &[TracerRecord]) -> ParseResult<()> {
    writeln!(
        out,
        "tracer\tx\ty\tz\tfilament\tdistance\tarc_length\tsegment\tt\tregion"
    )?;
    for r in records {
        let region = r.region.map_or_else(|| "-".to_owned(), |k| k.to_string());
        writeln!(
            out,
            "{}\t{:.8}\t{:.8}\t{:.8}\t{}\t{:.8}\t{:.8}\t{}\t{:.6}\t{}",
            r.tracer_index,
            r.position.x,
            r.position.y,
            r.position.z,
            r.filament,
            r.distance,
            r.arc_length,
            r.segment_index,
            r.t,
            region
        )?;
    }
    out.flush()?;
    Ok(())
}

fn create(path: &Path) -> io::Result<BufWriter<File>> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    Ok(BufWriter::new(File::create(path)?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::FilamentId;

    #[test]
    fn reads_points_skipping_comments_and_blanks() {
        let input = "# tracer catalog\n1 2 3\n\n  4.5\t-1e2 0 # trailing\n";
        let points = read_points(input.as_bytes()).expect("points");
        assert_eq!(points, vec![Point3::new(1.0, 2.0, 3.0), Point3::new(4.5, -100.0, 0.0)]);
    }

    #[test]
    fn reports_line_numbers() {
        match read_points("0 0 0\n1 2\n".as_bytes()) {
            Err(ParseError::Columns { line, found }) => assert_eq!((line, found), (2, 2)),
            other => panic!("unexpected: {other:?}"),
        }
        match read_points("# x y z\n0 zero 0\n".as_bytes()) {
            Err(ParseError::Number { line, token }) => {
                assert_eq!(line, 2);
                assert_eq!(token, "zero");
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn writes_records_as_table() {
        let record = TracerRecord {
            tracer_index: 3,
            position: Point3::new(1.0, 2.0, 0.0),
            filament: FilamentId(1),
            distance: 2.0,
            arc_length: 1.0,
            segment_index: 0,
            t: 0.5,
            closest_point: Point3::new(1.0, 0.0, 0.0),
            region: Some(2),
        };
        let mut buf = Vec::new();
        write_records(&mut buf, &[record]).expect("write");
        let text = String::from_utf8(buf).expect("utf8");
        let mut lines = text.lines();
        assert!(lines.next().is_some_and(|h| h.starts_with("tracer\tx")));
        assert_eq!(
            lines.next(),
            Some("3\t1.00000000\t2.00000000\t0.00000000\t1\t2.00000000\t1.00000000\t0\t0.500000\t2")
        );
        assert_eq!(lines.next(), None);
    }
}
