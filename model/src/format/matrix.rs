use std::io::{BufRead, Write};

use ndarray::{Array1, Array2, ArrayView1, ArrayView2};

use super::{Lines, lines::parse_error};
use crate::{ModelErr, Result};

/// Reads a block of `rows` lines with `cols` whitespace separated reals each, ended by a blank line
/// or left before the next marker line.
pub fn read_matrix<R: BufRead>(
    lines: &mut Lines<R>,
    what: &'static str,
    (rows, cols): (usize, usize),
) -> Result<Array2<f64>> {
    let mut data = Vec::with_capacity(rows * cols);
    let mut nrows = 0;

    while let Some((number, line)) = lines.next_line()? {
        if line.is_empty() {
            break;
        }
        if line.starts_with('\\') {
            lines.unread();
            break;
        }

        let before = data.len();
        for field in line.split_whitespace() {
            let value = field
                .parse::<f64>()
                .map_err(|e| parse_error(number, format!("{what}: bad number {field:?}: {e}")))?;
            data.push(value);
        }

        let got = data.len() - before;
        if got != cols {
            return Err(ModelErr::ShapeMismatch {
                what,
                got,
                expected: cols,
            });
        }

        nrows += 1;
    }

    if nrows != rows {
        return Err(ModelErr::ShapeMismatch {
            what,
            got: nrows,
            expected: rows,
        });
    }

    Array2::from_shape_vec((rows, cols), data).map_err(|e| lines.error(e.to_string()))
}

/// Reads a column of `len` reals, one per line, ended like [`read_matrix`].
pub fn read_vector<R: BufRead>(
    lines: &mut Lines<R>,
    what: &'static str,
    len: usize,
) -> Result<Array1<f64>> {
    let column = read_matrix(lines, what, (len, 1))?;
    column
        .into_shape_with_order(len)
        .map_err(|e| lines.error(e.to_string()))
}

pub fn write_matrix<W: Write>(w: &mut W, matrix: ArrayView2<f64>) -> Result<()> {
    for row in matrix.rows() {
        let mut first = true;

        for value in row {
            if !first {
                w.write_all(b"\t")?;
            }

            write!(w, "{value}")?;
            first = false;
        }

        writeln!(w)?;
    }

    Ok(())
}

pub fn write_vector<W: Write>(w: &mut W, vector: ArrayView1<f64>) -> Result<()> {
    for value in vector {
        writeln!(w, "{value}")?;
    }

    Ok(())
}
