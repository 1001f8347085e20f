use std::{
    fs::File,
    io::{BufRead, BufReader},
    path::Path,
};

use log::{debug, info, warn};

use super::Lines;
use crate::{
    ModelErr, Result,
    arch::{FirstStage, Model},
};

/// A known section of a model file, named by its marker line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Section {
    Config,
    Vocab,
    InputVocab,
    OutputVocab,
    InputEmbeddings,
    HiddenWeights1,
    HiddenBiases1,
    HiddenWeights2,
    HiddenBiases2,
    OutputWeights,
    OutputBiases,
    End,
}

impl Section {
    fn from_marker(line: &str) -> Option<Self> {
        let section = match line {
            "\\config" => Self::Config,
            "\\vocab" => Self::Vocab,
            "\\input_vocab" => Self::InputVocab,
            "\\output_vocab" => Self::OutputVocab,
            "\\input_embeddings" => Self::InputEmbeddings,
            "\\hidden_weights 1" => Self::HiddenWeights1,
            "\\hidden_biases 1" => Self::HiddenBiases1,
            "\\hidden_weights 2" => Self::HiddenWeights2,
            "\\hidden_biases 2" => Self::HiddenBiases2,
            "\\output_weights" => Self::OutputWeights,
            "\\output_biases" => Self::OutputBiases,
            "\\end" => Self::End,
            _ => return None,
        };

        Some(section)
    }
}

enum ReadState {
    AwaitingSection,
    InSection(Section),
    SkippingSection,
    Done,
}

/// Reads words, one per line, up to the next blank or marker line.
fn read_words<R: BufRead>(lines: &mut Lines<R>) -> Result<Vec<String>> {
    let mut words = Vec::new();

    while let Some((_, line)) = lines.next_line()? {
        if line.is_empty() {
            break;
        }
        if line.starts_with('\\') {
            lines.unread();
            break;
        }

        words.push(line.to_string());
    }

    Ok(words)
}

impl Model {
    /// Reads a model from `reader`, replacing the current topology and parameters.
    ///
    /// Sections may come in any order; a `\config` section must precede the parameter sections
    /// since it fixes their shapes. Unknown sections are skipped with a warning, everything after
    /// `\end` is ignored.
    ///
    /// # Arguments
    /// * `reader` - The model file contents.
    /// * `input_words` - Where to store the input vocabulary, if wanted.
    /// * `output_words` - Where to store the output vocabulary, if wanted. A shared `\vocab`
    ///   section fills both lists.
    pub fn read_from<R: BufRead>(
        &mut self,
        reader: R,
        mut input_words: Option<&mut Vec<String>>,
        mut output_words: Option<&mut Vec<String>>,
    ) -> Result<()> {
        let mut lines = Lines::new(reader);
        let mut state = ReadState::AwaitingSection;

        loop {
            state = match state {
                ReadState::AwaitingSection => match lines.next_line()? {
                    None => ReadState::Done,
                    Some((_, "")) => ReadState::AwaitingSection,
                    Some((_, line)) if line.starts_with('\\') => {
                        debug!("reading section {line}");

                        match Section::from_marker(line) {
                            Some(section) => ReadState::InSection(section),
                            None => {
                                warn!("unrecognized section: {line}");
                                ReadState::SkippingSection
                            }
                        }
                    }
                    Some((number, line)) => {
                        warn!("unrecognized section at line {number}: {line}");
                        ReadState::SkippingSection
                    }
                },
                ReadState::InSection(section) => {
                    self.read_section(section, &mut lines, &mut input_words, &mut output_words)?
                }
                ReadState::SkippingSection => {
                    let skipped = lines.skip_section()?;
                    debug!(skipped = skipped; "skipped section");
                    ReadState::AwaitingSection
                }
                ReadState::Done => break,
            };
        }

        Ok(())
    }

    fn read_section<R: BufRead>(
        &mut self,
        section: Section,
        lines: &mut Lines<R>,
        input_words: &mut Option<&mut Vec<String>>,
        output_words: &mut Option<&mut Vec<String>>,
    ) -> Result<ReadState> {
        match section {
            Section::Config => self.read_config_lines(lines)?,
            Section::Vocab => {
                let words = read_words(lines)?;
                info!("vocab: {} words", words.len());

                if let Some(output_words) = output_words {
                    **output_words = words.clone();
                }
                if let Some(input_words) = input_words {
                    **input_words = words;
                }
            }
            Section::InputVocab => {
                let words = read_words(lines)?;
                info!("input_vocab: {} words", words.len());

                if let Some(input_words) = input_words {
                    **input_words = words;
                }
            }
            Section::OutputVocab => match output_words {
                Some(output_words) => {
                    **output_words = read_words(lines)?;
                    info!("output_vocab: {} words", output_words.len());
                }
                None => {
                    debug!("skipping output_vocab section, no output vocabulary requested");
                    return Ok(ReadState::SkippingSection);
                }
            },
            Section::InputEmbeddings => match self.first_stage_mut() {
                FirstStage::Raw { embeddings, .. } => embeddings.read(lines)?,
                FirstStage::Premultiplied { .. } => return Err(ModelErr::Premultiplied),
            },
            Section::HiddenWeights1 => match self.first_stage_mut() {
                FirstStage::Raw { linear, .. } => linear.read_weights(lines)?,
                FirstStage::Premultiplied { .. } => return Err(ModelErr::Premultiplied),
            },
            Section::HiddenBiases1 => match self.first_stage_mut() {
                FirstStage::Raw { linear, .. } => linear.read_biases(lines)?,
                FirstStage::Premultiplied { .. } => return Err(ModelErr::Premultiplied),
            },
            Section::HiddenWeights2 => self.second_linear_mut().read_weights(lines)?,
            Section::HiddenBiases2 => self.second_linear_mut().read_biases(lines)?,
            Section::OutputWeights => self.output_layer_mut().read_weights(lines)?,
            Section::OutputBiases => self.output_layer_mut().read_biases(lines)?,
            Section::End => return Ok(ReadState::Done),
        }

        Ok(ReadState::AwaitingSection)
    }

    /// Reads a model file.
    ///
    /// # Returns
    /// An error naming `path` if it cannot be opened, or any error [`Model::read_from`] reports.
    pub fn read<P: AsRef<Path>>(
        &mut self,
        path: P,
        input_words: Option<&mut Vec<String>>,
        output_words: Option<&mut Vec<String>>,
    ) -> Result<()> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|source| ModelErr::Open {
            path: path.to_path_buf(),
            source,
        })?;

        info!("reading model from {}", path.display());
        self.read_from(BufReader::new(file), input_words, output_words)
    }
}
