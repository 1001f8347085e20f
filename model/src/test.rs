#![cfg(test)]

use std::io::Cursor;

use ndarray::{Array2, array};
use rand::{SeedableRng, rngs::StdRng};

use crate::{
    ActFn, FirstStage, Model, ModelErr, ParamUpdate, Topology, training::UpdateState,
};

fn topology(num_hidden: usize) -> Topology {
    Topology {
        ngram_size: 3,
        input_vocab_size: 7,
        output_vocab_size: 5,
        input_embedding_dimension: 4,
        num_hidden,
        output_embedding_dimension: 3,
    }
}

fn random_model(num_hidden: usize, seed: u64) -> Model {
    let mut model = Model::new(topology(num_hidden));
    let mut rng = StdRng::seed_from_u64(seed);
    model
        .initialize(&mut rng, false, 0.5, -1., ParamUpdate::Sgd, 0.)
        .unwrap();
    model
}

fn write_string(model: &Model, input: Option<&[String]>, output: Option<&[String]>) -> String {
    let mut out = Vec::new();
    model.write_to(&mut out, input, output).unwrap();
    String::from_utf8(out).unwrap()
}

fn assert_same_params(a: &Model, b: &Model) {
    assert_eq!(a.topology(), b.topology());
    assert_eq!(a.act_fn(), b.act_fn());
    assert_eq!(
        a.embeddings().unwrap().table(),
        b.embeddings().unwrap().table()
    );
    assert_eq!(a.first_linear().weights(), b.first_linear().weights());
    assert_eq!(a.first_linear().biases(), b.first_linear().biases());
    assert_eq!(a.second_linear().weights(), b.second_linear().weights());
    assert_eq!(a.second_linear().biases(), b.second_linear().biases());
    assert_eq!(a.output_layer().weights(), b.output_layer().weights());
    assert_eq!(a.output_layer().biases(), b.output_layer().biases());
}

#[test]
fn resize_derives_every_shape() {
    let model = Model::new(topology(6));

    assert_eq!(model.embeddings().unwrap().table().dim(), (7, 4));
    assert_eq!(model.first_linear().weights().dim(), (6, 8));
    assert_eq!(model.second_linear().weights().dim(), (3, 6));
    assert_eq!(model.output_layer().weights().dim(), (5, 3));
    assert!(!model.is_premultiplied());
}

#[test]
fn no_hidden_layer_degenerates_second_stage() {
    let model = Model::new(topology(0));

    assert_eq!(model.first_linear().weights().dim(), (3, 8));
    assert_eq!(model.second_linear().weights().dim(), (1, 1));
}

#[test]
fn initialize_sets_output_bias_and_update_state() {
    let mut model = Model::new(topology(6));
    let mut rng = StdRng::seed_from_u64(1);
    model
        .initialize(&mut rng, true, 0.1, -2., ParamUpdate::Adagrad, 1e-4)
        .unwrap();

    assert!(model.output_layer().biases().iter().all(|&b| b == -2.));
    assert!(model.embeddings().unwrap().table().iter().any(|&w| w != 0.));

    let (weights_state, _) = model.output_layer().update_state();
    assert!(matches!(weights_state, UpdateState::Adagrad { .. }));
}

#[test]
fn write_then_read_is_exact() {
    let model = random_model(6, 3);
    let text = write_string(&model, None, None);

    let mut back = Model::default();
    back.read_from(Cursor::new(text), None, None).unwrap();
    assert_same_params(&model, &back);
}

#[test]
fn write_then_read_through_a_file() {
    let mut model = random_model(0, 4);
    model.set_act_fn(ActFn::HardTanh);

    let words: Vec<String> = (0..7).map(|i| format!("w{i}")).collect();
    let path = std::env::temp_dir().join(format!("model-roundtrip-{}.nnlm", std::process::id()));
    model.write(&path, Some(words.as_slice()), Some(&words[..5])).unwrap();

    let mut input_words = Vec::new();
    let mut output_words = Vec::new();
    let mut back = Model::default();
    back.read(&path, Some(&mut input_words), Some(&mut output_words))
        .unwrap();
    std::fs::remove_file(&path).unwrap();

    assert_same_params(&model, &back);
    assert_eq!(input_words, words);
    assert_eq!(output_words, &words[..5]);
}

#[test]
fn canonical_section_order() {
    let model = random_model(6, 5);
    let words = vec!["a".to_string()];
    let text = write_string(&model, Some(words.as_slice()), Some(words.as_slice()));

    let markers: Vec<&str> = text.lines().filter(|l| l.starts_with('\\')).collect();
    assert_eq!(
        markers,
        [
            "\\config",
            "\\input_vocab",
            "\\output_vocab",
            "\\input_embeddings",
            "\\hidden_weights 1",
            "\\hidden_biases 1",
            "\\hidden_weights 2",
            "\\hidden_biases 2",
            "\\output_weights",
            "\\output_biases",
            "\\end",
        ]
    );
    assert!(text.contains("\nversion 1\n"));
}

#[test]
fn unknown_section_is_skipped() {
    let model = random_model(6, 6);
    let text = write_string(&model, None, None);
    let text = text.replace(
        "\\hidden_weights 2\n",
        "\\dropout_masks\n1 0 1\n0 1 1\n\n\\hidden_weights 2\n",
    );

    let mut back = Model::default();
    back.read_from(Cursor::new(text), None, None).unwrap();
    assert_same_params(&model, &back);
}

#[test]
fn unknown_section_ends_at_the_next_marker() {
    let model = random_model(6, 6);
    let text = write_string(&model, None, None).replace(
        "\\hidden_weights 2\n",
        "\\dropout_masks\n1 0 1\n\\hidden_weights 2\n",
    );

    let mut back = Model::default();
    back.read_from(Cursor::new(text), None, None).unwrap();
    assert_same_params(&model, &back);
}

#[test]
fn empty_unknown_section_before_a_known_one() {
    let model = random_model(6, 17);
    let text = write_string(&model, None, None)
        .replace("\\hidden_weights 2\n", "\\new_section\n\\hidden_weights 2\n");

    let mut back = Model::default();
    back.read_from(Cursor::new(text), None, None).unwrap();
    assert!(back.second_linear().weights().iter().any(|&w| w != 0.));
    assert_same_params(&model, &back);
}

#[test]
fn vocab_ends_at_the_next_marker() {
    let model = random_model(0, 18);
    let text = write_string(&model, None, None).replace(
        "\\input_embeddings\n",
        "\\input_vocab\n<s>\nthe\n\\input_embeddings\n",
    );

    let mut input_words = Vec::new();
    let mut back = Model::default();
    back.read_from(Cursor::new(text), Some(&mut input_words), None)
        .unwrap();

    assert_eq!(input_words, ["<s>", "the"]);
    assert_same_params(&model, &back);
}

#[test]
fn trailing_whitespace_is_ignored() {
    let model = random_model(0, 7);
    let text = write_string(&model, None, None)
        .lines()
        .map(|l| format!("{l} \t\n"))
        .collect::<String>();

    let mut back = Model::default();
    back.read_from(Cursor::new(text), None, None).unwrap();
    assert_same_params(&model, &back);
}

#[test]
fn shared_vocab_fills_both_lists() {
    let model = random_model(0, 8);
    let text = write_string(&model, None, None).replace(
        "\\input_embeddings\n",
        "\\vocab\n<s>\n</s>\nthe\n\n\\input_embeddings\n",
    );

    let mut input_words = Vec::new();
    let mut output_words = Vec::new();
    let mut back = Model::default();
    back.read_from(
        Cursor::new(text),
        Some(&mut input_words),
        Some(&mut output_words),
    )
    .unwrap();

    assert_eq!(input_words, ["<s>", "</s>", "the"]);
    assert_eq!(output_words, input_words);
}

#[test]
fn unrequested_output_vocab_is_skipped() {
    let model = random_model(0, 9);
    let words = vec!["x".to_string(), "y".to_string()];
    let text = write_string(&model, Some(words.as_slice()), Some(words.as_slice()));

    let mut input_words = Vec::new();
    let mut back = Model::default();
    back.read_from(Cursor::new(text), Some(&mut input_words), None)
        .unwrap();

    assert_eq!(input_words, words);
    assert_same_params(&model, &back);
}

#[test]
fn end_stops_reading() {
    let model = random_model(0, 10);
    let text = write_string(&model, None, None) + "\\config\nversion 2\n\n";

    let mut back = Model::default();
    back.read_from(Cursor::new(text), None, None).unwrap();
    assert_same_params(&model, &back);
}

#[test]
fn version_two_is_rejected() {
    let model = random_model(0, 11);
    let text = write_string(&model, None, None).replace("version 1", "version 2");

    let mut back = Model::default();
    let err = back.read_from(Cursor::new(text), None, None).unwrap_err();
    assert!(matches!(err, ModelErr::VersionMismatch { found: 2, .. }));
}

#[test]
fn wrong_embedding_shape_is_rejected() {
    let model = random_model(0, 12);
    let text = write_string(&model, None, None)
        .replace("\\input_embeddings\n", "\\input_embeddings\n1\t2\n");

    let mut back = Model::default();
    let err = back.read_from(Cursor::new(text), None, None).unwrap_err();
    assert!(matches!(
        err,
        ModelErr::ShapeMismatch {
            what: "input embeddings",
            ..
        }
    ));
}

#[test]
fn premultiply_preserves_first_stage() {
    for num_hidden in [0, 6] {
        let mut model = random_model(num_hidden, 13);
        let contexts = array![[0, 6, 3], [2, 2, 5]];
        let dim_out = model.first_linear().dim_out();

        let embeddings = model.embeddings().unwrap();
        let mut gathered = Array2::zeros((8, 3));
        embeddings.gather(contexts.view(), gathered.view_mut());
        let mut expected = Array2::zeros((dim_out, 3));
        model
            .first_linear()
            .forward(gathered.view(), expected.view_mut());

        model.premultiply();
        assert!(model.is_premultiplied());
        assert!(model.embeddings().is_none());
        assert_eq!(model.first_linear().dim_in(), 7 * 2);

        let mut fused = Array2::zeros((dim_out, 3));
        model
            .first_linear()
            .forward_one_hot(contexts.view(), 7, fused.view_mut());

        for (e, f) in expected.iter().zip(fused.iter()) {
            assert!((e - f).abs() <= 1e-12 * e.abs().max(1.), "{e} != {f}");
        }
    }
}

#[test]
fn premultiply_is_idempotent() {
    let mut model = random_model(6, 14);
    model.premultiply();
    let fused = model.first_linear().weights().to_owned();

    model.premultiply();
    assert_eq!(model.first_linear().weights(), fused);
    assert!(matches!(model.first_stage(), FirstStage::Premultiplied { .. }));
}

#[test]
fn premultiplied_model_cannot_be_written() {
    let mut model = random_model(0, 15);
    model.premultiply();

    let err = model.write_to(&mut Vec::new(), None, None).unwrap_err();
    assert!(matches!(err, ModelErr::Premultiplied));
}

#[test]
fn resize_resets_premultiplication() {
    let mut model = random_model(0, 16);
    model.premultiply();

    model.resize(topology(0));
    assert!(!model.is_premultiplied());
    assert!(model.embeddings().is_some());
}
