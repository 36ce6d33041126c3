use ahash::AHashMap;
use common::{ProductField, Result, StopWords, VectorizerParams};
use tantivy::tokenizer::{
    AsciiFoldingFilter, Language, LowerCaser, SimpleTokenizer, StopWordFilter, TextAnalyzer,
    TokenStream,
};

use crate::similarity::FieldSimilarity;

const MIN_TOKEN_CHARS: usize = 2;

/// TF-IDF term weights for one text field with cosine similarity at query time.
///
/// Rows are L2-normalized `tf * idf` vectors (`idf = ln((1 + n) / (1 + df)) + 1`,
/// `tf` optionally `1 + ln(tf)`), stored as per-term postings so a query only
/// touches the items sharing at least one term with it.
pub struct TfidfField {
    analyzer: TextAnalyzer,
    ngram_range: (usize, usize),
    sublinear_tf: bool,
    vocabulary: AHashMap<String, u32>,
    idf: Vec<f32>,
    postings: Vec<Vec<(u32, f32)>>,
    doc_count: usize,
}

impl TfidfField {
    /// Returns `Ok(None)` when no term survives document-frequency pruning.
    pub fn fit(
        field: ProductField,
        texts: &[String],
        params: &VectorizerParams,
    ) -> Result<Option<Self>> {
        params.validate(field)?;
        let mut analyzer = build_analyzer(params);
        let doc_terms = texts
            .iter()
            .map(|text| term_counts(&mut analyzer, params.ngram_range, text))
            .collect::<Vec<_>>();

        let mut doc_freq: AHashMap<&str, usize> = AHashMap::new();
        for terms in &doc_terms {
            for term in terms.keys() {
                *doc_freq.entry(term.as_str()).or_insert(0) += 1;
            }
        }

        let doc_count = texts.len();
        let max_doc_count = f64::from(params.max_df) * doc_count as f64;
        let mut kept = doc_freq
            .into_iter()
            .filter(|&(_, df)| df >= params.min_df && df as f64 <= max_doc_count)
            .collect::<Vec<_>>();
        if kept.is_empty() {
            return Ok(None);
        }
        kept.sort_unstable_by(|a, b| a.0.cmp(b.0));

        let n = doc_count as f32;
        let mut vocabulary = AHashMap::with_capacity(kept.len());
        let mut idf = Vec::with_capacity(kept.len());
        for (term_id, (term, df)) in kept.into_iter().enumerate() {
            vocabulary.insert(term.to_string(), term_id as u32);
            idf.push(((1.0 + n) / (1.0 + df as f32)).ln() + 1.0);
        }

        let mut postings = vec![Vec::new(); idf.len()];
        for (doc, terms) in doc_terms.iter().enumerate() {
            let row = weigh(terms, &vocabulary, &idf, params.sublinear_tf);
            for (term_id, weight) in row {
                postings[term_id as usize].push((doc as u32, weight));
            }
        }

        Ok(Some(Self {
            analyzer,
            ngram_range: params.ngram_range,
            sublinear_tf: params.sublinear_tf,
            vocabulary,
            idf,
            postings,
            doc_count,
        }))
    }

    pub fn vocabulary_len(&self) -> usize {
        self.vocabulary.len()
    }

    pub fn doc_count(&self) -> usize {
        self.doc_count
    }
}

impl FieldSimilarity for TfidfField {
    fn scores(&self, query: &str) -> Vec<f32> {
        let mut scores = vec![0.0; self.doc_count];
        let mut analyzer = self.analyzer.clone();
        let terms = term_counts(&mut analyzer, self.ngram_range, query);
        for (term_id, query_weight) in weigh(&terms, &self.vocabulary, &self.idf, self.sublinear_tf)
        {
            for &(doc, doc_weight) in &self.postings[term_id as usize] {
                scores[doc as usize] += query_weight * doc_weight;
            }
        }
        scores
    }
}

fn build_analyzer(params: &VectorizerParams) -> TextAnalyzer {
    let mut builder = TextAnalyzer::builder(SimpleTokenizer::default()).dynamic();
    if params.lowercase {
        builder = builder.filter_dynamic(LowerCaser);
    }
    if params.strip_accents {
        builder = builder.filter_dynamic(AsciiFoldingFilter);
    }
    if let Some(StopWords::English) = params.stop_words
        && let Some(filter) = StopWordFilter::new(Language::English)
    {
        builder = builder.filter_dynamic(filter);
    }
    builder.build()
}

fn term_counts(
    analyzer: &mut TextAnalyzer,
    (min_n, max_n): (usize, usize),
    text: &str,
) -> AHashMap<String, u32> {
    let mut words = Vec::new();
    let mut stream = analyzer.token_stream(text);
    while stream.advance() {
        let token = stream.token();
        if token.text.chars().count() >= MIN_TOKEN_CHARS {
            words.push(token.text.clone());
        }
    }

    let mut counts = AHashMap::new();
    for n in min_n..=max_n {
        for window in words.windows(n) {
            *counts.entry(window.join(" ")).or_insert(0) += 1;
        }
    }
    counts
}

/// L2-normalized weights for the in-vocabulary terms of one document or query.
fn weigh(
    terms: &AHashMap<String, u32>,
    vocabulary: &AHashMap<String, u32>,
    idf: &[f32],
    sublinear_tf: bool,
) -> Vec<(u32, f32)> {
    let mut row = terms
        .iter()
        .filter_map(|(term, &tf)| {
            let term_id = *vocabulary.get(term.as_str())?;
            let tf = if sublinear_tf {
                1.0 + (tf as f32).ln()
            } else {
                tf as f32
            };
            Some((term_id, tf * idf[term_id as usize]))
        })
        .collect::<Vec<_>>();

    let norm = row.iter().map(|(_, w)| w * w).sum::<f32>().sqrt();
    if norm <= 0.0 {
        return Vec::new();
    }
    for (_, weight) in &mut row {
        *weight /= norm;
    }
    row
}
