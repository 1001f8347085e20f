use std::{
    fs::File,
    io::{BufRead, BufReader},
    path::Path,
};

use log::warn;

use super::{Lines, lines::parse_error};
use crate::{
    ModelErr, Result,
    arch::{ActFn, Model, Topology},
};

/// The only model file format version this crate reads and writes.
pub const FORMAT_VERSION: u32 = 1;

#[derive(Default)]
struct ConfigFields {
    ngram_size: Option<usize>,
    input_vocab_size: Option<usize>,
    output_vocab_size: Option<usize>,
    input_embedding_dimension: Option<usize>,
    num_hidden: Option<usize>,
    output_embedding_dimension: Option<usize>,
    version: Option<u32>,
}

impl ConfigFields {
    fn topology(&self) -> Result<Topology> {
        Ok(Topology {
            ngram_size: self.ngram_size.ok_or(ModelErr::MissingConfig("ngram_size"))?,
            input_vocab_size: self
                .input_vocab_size
                .ok_or(ModelErr::MissingConfig("input_vocab_size"))?,
            output_vocab_size: self
                .output_vocab_size
                .ok_or(ModelErr::MissingConfig("output_vocab_size"))?,
            input_embedding_dimension: self
                .input_embedding_dimension
                .ok_or(ModelErr::MissingConfig("input_embedding_dimension"))?,
            num_hidden: self.num_hidden.ok_or(ModelErr::MissingConfig("num_hidden"))?,
            output_embedding_dimension: self
                .output_embedding_dimension
                .ok_or(ModelErr::MissingConfig("output_embedding_dimension"))?,
        })
    }
}

fn parse_field<T>(number: usize, key: &str, value: &str) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    value
        .parse()
        .map_err(|e| parse_error(number, format!("bad value {value:?} for {key}: {e}")))
}

impl Model {
    /// Reads `key value` lines up to the next blank line, then resizes the model after them.
    ///
    /// # Returns
    /// `ModelErr::VersionMismatch` if the declared version is not [`FORMAT_VERSION`], or an error
    /// if a topology field is missing or malformed. Unrecognized keys are only warned about.
    pub(crate) fn read_config_lines<R: BufRead>(&mut self, lines: &mut Lines<R>) -> Result<()> {
        let mut fields = ConfigFields::default();
        let mut act_fn = self.act_fn();

        while let Some((number, line)) = lines.next_line()? {
            if line.is_empty() {
                break;
            }

            let mut words = line.split_whitespace();
            let (Some(key), Some(value)) = (words.next(), words.next()) else {
                return Err(parse_error(number, format!("expected `key value`, got {line:?}")));
            };

            match key {
                "ngram_size" => fields.ngram_size = Some(parse_field(number, key, value)?),
                "vocab_size" => {
                    let size = parse_field(number, key, value)?;
                    fields.input_vocab_size = Some(size);
                    fields.output_vocab_size = Some(size);
                }
                "input_vocab_size" => {
                    fields.input_vocab_size = Some(parse_field(number, key, value)?)
                }
                "output_vocab_size" => {
                    fields.output_vocab_size = Some(parse_field(number, key, value)?)
                }
                "input_embedding_dimension" => {
                    fields.input_embedding_dimension = Some(parse_field(number, key, value)?)
                }
                "num_hidden" => fields.num_hidden = Some(parse_field(number, key, value)?),
                "output_embedding_dimension" => {
                    fields.output_embedding_dimension = Some(parse_field(number, key, value)?)
                }
                "activation_function" => act_fn = value.parse::<ActFn>()?,
                "version" => {
                    let found = parse_field(number, key, value)?;
                    if found != FORMAT_VERSION {
                        return Err(ModelErr::VersionMismatch {
                            expected: FORMAT_VERSION,
                            found,
                        });
                    }

                    fields.version = Some(found);
                }
                other => warn!("unrecognized field in config: {other}"),
            }
        }

        if fields.version.is_none() {
            return Err(ModelErr::MissingConfig("version"));
        }

        self.resize(fields.topology()?);
        self.set_act_fn(act_fn);
        Ok(())
    }

    /// Reads a standalone config (the body of a `\config` section) from `reader`.
    pub fn read_config_from<R: BufRead>(&mut self, reader: R) -> Result<()> {
        self.read_config_lines(&mut Lines::new(reader))
    }

    /// Reads a standalone config file.
    pub fn read_config<P: AsRef<Path>>(&mut self, path: P) -> Result<()> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|source| ModelErr::Open {
            path: path.to_path_buf(),
            source,
        })?;

        self.read_config_from(BufReader::new(file))
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;

    const CONFIG: &str = "\
version 1
ngram_size 3
vocab_size 10
input_embedding_dimension 4
num_hidden 0
output_embedding_dimension 5
activation_function tanh
";

    #[test]
    fn vocab_size_sets_both_vocabularies() {
        let mut model = Model::default();
        model.read_config_from(Cursor::new(CONFIG)).unwrap();

        let topology = model.topology();
        assert_eq!(topology.ngram_size, 3);
        assert_eq!(topology.input_vocab_size, 10);
        assert_eq!(topology.output_vocab_size, 10);
        assert_eq!(model.act_fn(), ActFn::Tanh);
        assert_eq!(model.first_linear().dim_out(), 5);
        assert_eq!(model.first_linear().dim_in(), 8);
        assert_eq!(model.second_linear().weights().dim(), (1, 1));
    }

    #[test]
    fn unrecognized_keys_are_tolerated() {
        let config = format!("{CONFIG}dropout 0.5\n");

        let mut model = Model::default();
        model.read_config_from(Cursor::new(config)).unwrap();
        assert_eq!(model.topology().output_embedding_dimension, 5);
    }

    #[test]
    fn version_mismatch() {
        let config = CONFIG.replace("version 1", "version 2");

        let mut model = Model::default();
        let err = model.read_config_from(Cursor::new(config)).unwrap_err();
        assert!(matches!(
            err,
            ModelErr::VersionMismatch {
                expected: 1,
                found: 2
            }
        ));
    }

    #[test]
    fn missing_topology_field() {
        let config = CONFIG.replace("num_hidden 0\n", "");

        let mut model = Model::default();
        let err = model.read_config_from(Cursor::new(config)).unwrap_err();
        assert!(matches!(err, ModelErr::MissingConfig("num_hidden")));
    }

    #[test]
    fn missing_file_names_the_path() {
        let mut model = Model::default();
        let err = model.read_config("/nonexistent/nplm.config").unwrap_err();
        assert!(err.to_string().contains("/nonexistent/nplm.config"));
    }
}
