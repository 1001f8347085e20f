use std::{
    fs::File,
    io::{BufWriter, Write},
    path::Path,
};

use log::info;

use super::FORMAT_VERSION;
use crate::{
    ModelErr, Result,
    arch::{FirstStage, Model},
};

fn write_words<W: Write>(w: &mut W, words: &[String]) -> Result<()> {
    for word in words {
        writeln!(w, "{word}")?;
    }

    Ok(())
}

impl Model {
    /// Writes the model in the canonical section order, each section followed by a blank line.
    ///
    /// # Returns
    /// `ModelErr::Premultiplied` if the model was premultiplied, its embedding table is gone and
    /// cannot be written.
    pub fn write_to<W: Write>(
        &self,
        w: &mut W,
        input_words: Option<&[String]>,
        output_words: Option<&[String]>,
    ) -> Result<()> {
        let FirstStage::Raw { embeddings, linear } = self.first_stage() else {
            return Err(ModelErr::Premultiplied);
        };

        let topology = self.topology();
        writeln!(w, "\\config")?;
        writeln!(w, "version {FORMAT_VERSION}")?;
        writeln!(w, "ngram_size {}", topology.ngram_size)?;
        writeln!(w, "input_vocab_size {}", topology.input_vocab_size)?;
        writeln!(w, "output_vocab_size {}", topology.output_vocab_size)?;
        writeln!(
            w,
            "input_embedding_dimension {}",
            topology.input_embedding_dimension
        )?;
        writeln!(w, "num_hidden {}", topology.num_hidden)?;
        writeln!(
            w,
            "output_embedding_dimension {}",
            topology.output_embedding_dimension
        )?;
        writeln!(w, "activation_function {}", self.act_fn())?;
        writeln!(w)?;

        if let Some(words) = input_words {
            writeln!(w, "\\input_vocab")?;
            write_words(w, words)?;
            writeln!(w)?;
        }

        if let Some(words) = output_words {
            writeln!(w, "\\output_vocab")?;
            write_words(w, words)?;
            writeln!(w)?;
        }

        writeln!(w, "\\input_embeddings")?;
        embeddings.write(w)?;
        writeln!(w)?;

        writeln!(w, "\\hidden_weights 1")?;
        linear.write_weights(w)?;
        writeln!(w)?;

        writeln!(w, "\\hidden_biases 1")?;
        linear.write_biases(w)?;
        writeln!(w)?;

        writeln!(w, "\\hidden_weights 2")?;
        self.second_linear().write_weights(w)?;
        writeln!(w)?;

        writeln!(w, "\\hidden_biases 2")?;
        self.second_linear().write_biases(w)?;
        writeln!(w)?;

        writeln!(w, "\\output_weights")?;
        self.output_layer().write_weights(w)?;
        writeln!(w)?;

        writeln!(w, "\\output_biases")?;
        self.output_layer().write_biases(w)?;
        writeln!(w)?;

        writeln!(w, "\\end")?;
        Ok(())
    }

    /// Writes the model to a file, creating or truncating it.
    pub fn write<P: AsRef<Path>>(
        &self,
        path: P,
        input_words: Option<&[String]>,
        output_words: Option<&[String]>,
    ) -> Result<()> {
        let path = path.as_ref();
        let file = File::create(path).map_err(|source| ModelErr::Open {
            path: path.to_path_buf(),
            source,
        })?;

        let mut w = BufWriter::new(file);
        self.write_to(&mut w, input_words, output_words)?;
        w.flush()?;

        info!("wrote model to {}", path.display());
        Ok(())
    }
}
