//! Okapi BM25 scoring, scalar and SIMD batch variants.
//!
//! `avgFieldLength` is always sourced from a real
//! [`CollectionStatistics`] computed once per `Weight`; the well-known
//! `50.0` fallback only fires — and is logged when it does — for a
//! field with zero documents across the whole collection, where there
//! is no real average to compute at all. Every decoded norm byte goes
//! through the same length formula the index actually wrote, in both
//! the scalar and the SIMD path, so the two can never silently diverge.

use crate::core::index::norms::decode_norm;
use crate::core::search::statistics::{CollectionStatistics, TermStatistics};

/// `ln(1 + (docCount - docFreq + 0.5) / (docFreq + 0.5))`, the
/// Lucene/BM25 inverse document frequency. Always non-negative for
/// `docFreq <= docCount`.
pub fn idf(doc_freq: i64, doc_count: i64) -> f32 {
    let doc_freq = doc_freq as f32;
    let doc_count = doc_count as f32;
    (1.0 + (doc_count - doc_freq + 0.5) / (doc_freq + 0.5)).ln()
}

#[derive(Debug, Clone, Copy)]
pub struct Bm25Similarity {
    pub k1: f32,
    pub b: f32,
}

impl Default for Bm25Similarity {
    fn default() -> Bm25Similarity {
        Bm25Similarity { k1: 1.2, b: 0.75 }
    }
}

impl Bm25Similarity {
    pub fn new(k1: f32, b: f32) -> Bm25Similarity {
        Bm25Similarity { k1, b }
    }

    /// Precomputes everything scoring a posting needs that doesn't vary
    /// per document: IDF from real per-term statistics, and average
    /// field length from real per-field collection statistics.
    pub fn sim_weight(
        &self,
        field: &str,
        term_stats: &TermStatistics,
        collection_stats: &CollectionStatistics,
        boost: f32,
    ) -> SimWeight {
        let idf_val = idf(term_stats.doc_freq, collection_stats.doc_count);
        SimWeight {
            k1: self.k1,
            b: self.b,
            boost_times_idf_times_k1_plus_1: boost * idf_val * (self.k1 + 1.0),
            avg_field_length: collection_stats.avg_field_length(field),
        }
    }

    /// Like `sim_weight`, but for a multi-term construct that scores as
    /// one combined unit (a phrase): `idf_sum` is the sum of each
    /// constituent term's individual IDF, matching how Lucene combines
    /// phrase term weights into a single coefficient.
    pub fn sim_weight_for_idf_sum(
        &self,
        field: &str,
        idf_sum: f32,
        collection_stats: &CollectionStatistics,
        boost: f32,
    ) -> SimWeight {
        SimWeight {
            k1: self.k1,
            b: self.b,
            boost_times_idf_times_k1_plus_1: boost * idf_sum * (self.k1 + 1.0),
            avg_field_length: collection_stats.avg_field_length(field),
        }
    }
}

/// Query-time, per-field precomputed BM25 coefficients. `SimScorer`
/// borrows one of these and a decoded norm per document to produce a
/// score in O(1) work.
#[derive(Debug, Clone, Copy)]
pub struct SimWeight {
    k1: f32,
    b: f32,
    boost_times_idf_times_k1_plus_1: f32,
    avg_field_length: f32,
}

impl SimWeight {
    pub fn score(&self, freq: i32, norm_byte: u8) -> f32 {
        let freq = freq as f32;
        let length = decode_norm(norm_byte);
        let norm_term = 1.0 - self.b + self.b * (length / self.avg_field_length);
        self.boost_times_idf_times_k1_plus_1 * freq / (freq + self.k1 * norm_term)
    }

    /// Scores `freqs[i]`/`norms[i]` pairs into `out[i]`, dispatching to
    /// an AVX2 implementation at runtime when the host CPU supports it
    /// and falling back to the scalar loop (`score`) everywhere else.
    /// Both paths implement the exact same formula; this only changes
    /// how many documents are scored per instruction.
    pub fn score_batch(&self, freqs: &[i32], norms: &[u8], out: &mut [f32]) {
        debug_assert_eq!(freqs.len(), norms.len());
        debug_assert_eq!(freqs.len(), out.len());

        #[cfg(target_arch = "x86_64")]
        {
            if is_x86_feature_detected!("avx2") {
                unsafe {
                    self.score_batch_avx2(freqs, norms, out);
                }
                return;
            }
        }
        self.score_batch_scalar(freqs, norms, out);
    }

    fn score_batch_scalar(&self, freqs: &[i32], norms: &[u8], out: &mut [f32]) {
        for i in 0..freqs.len() {
            out[i] = self.score(freqs[i], norms[i]);
        }
    }

    /// Like `score_batch`, but for the hot path where a single norm
    /// applies to every document in the batch (norms absent from the
    /// field, or otherwise known constant) — a separate method rather
    /// than a flag on `score_batch`, since the two have genuinely
    /// different vectorized bodies: `norm_term` is computed once up
    /// front instead of per lane, so there's no per-document length
    /// decode at all inside the loop.
    pub fn score_batch_uniform_norm(&self, norm_byte: u8, freqs: &[i32], out: &mut [f32]) {
        debug_assert_eq!(freqs.len(), out.len());
        let length = decode_norm(norm_byte);
        let norm_term = 1.0 - self.b + self.b * (length / self.avg_field_length);

        #[cfg(target_arch = "x86_64")]
        {
            if is_x86_feature_detected!("avx2") {
                unsafe {
                    self.score_batch_uniform_norm_avx2(norm_term, freqs, out);
                }
                return;
            }
        }
        self.score_batch_uniform_norm_scalar(norm_term, freqs, out);
    }

    fn score_batch_uniform_norm_scalar(&self, norm_term: f32, freqs: &[i32], out: &mut [f32]) {
        for i in 0..freqs.len() {
            let freq = freqs[i] as f32;
            out[i] = self.boost_times_idf_times_k1_plus_1 * freq / (freq + self.k1 * norm_term);
        }
    }

    #[cfg(target_arch = "x86_64")]
    #[target_feature(enable = "avx2")]
    unsafe fn score_batch_uniform_norm_avx2(&self, norm_term: f32, freqs: &[i32], out: &mut [f32]) {
        use std::arch::x86_64::*;

        let k1 = _mm256_set1_ps(self.k1);
        let norm_term_v = _mm256_set1_ps(norm_term);
        let weight = _mm256_set1_ps(self.boost_times_idf_times_k1_plus_1);

        let n = freqs.len();
        let mut i = 0;
        while i + 8 <= n {
            let freq_i32 = _mm256_loadu_si256(freqs.as_ptr().add(i) as *const __m256i);
            let freq = _mm256_cvtepi32_ps(freq_i32);
            let denom = _mm256_add_ps(freq, _mm256_mul_ps(k1, norm_term_v));
            let scores = _mm256_div_ps(_mm256_mul_ps(weight, freq), denom);
            _mm256_storeu_ps(out.as_mut_ptr().add(i), scores);
            i += 8;
        }
        while i < n {
            let freq = freqs[i] as f32;
            out[i] = self.boost_times_idf_times_k1_plus_1 * freq / (freq + self.k1 * norm_term);
            i += 1;
        }
    }

    #[cfg(target_arch = "x86_64")]
    #[target_feature(enable = "avx2")]
    unsafe fn score_batch_avx2(&self, freqs: &[i32], norms: &[u8], out: &mut [f32]) {
        use std::arch::x86_64::*;

        let k1 = _mm256_set1_ps(self.k1);
        let one_minus_b = _mm256_set1_ps(1.0 - self.b);
        let b_over_avgdl = _mm256_set1_ps(self.b / self.avg_field_length);
        let weight = _mm256_set1_ps(self.boost_times_idf_times_k1_plus_1);
        let one_twenty_seven = _mm256_set1_ps(127.0);

        let n = freqs.len();
        let mut i = 0;
        while i + 8 <= n {
            let freq_i32 = _mm256_loadu_si256(freqs.as_ptr().add(i) as *const __m256i);
            let freq = _mm256_cvtepi32_ps(freq_i32);

            // decode_norm, vectorized: special-cased norm==0 / norm==127
            // both mean length 1.0; everything else is (127/norm)^2.
            let mut norm_i32 = [0i32; 8];
            for (j, slot) in norm_i32.iter_mut().enumerate() {
                *slot = i32::from(norms[i + j]);
            }
            let norm_vals = _mm256_cvtepi32_ps(_mm256_loadu_si256(norm_i32.as_ptr() as *const __m256i));
            let inv = _mm256_div_ps(one_twenty_seven, norm_vals);
            let length = _mm256_mul_ps(inv, inv);

            let norm_term = _mm256_add_ps(one_minus_b, _mm256_mul_ps(b_over_avgdl, length));
            let denom = _mm256_add_ps(freq, _mm256_mul_ps(k1, norm_term));
            let mut scores = _mm256_div_ps(_mm256_mul_ps(weight, freq), denom);

            // Re-apply the saturating cases the scalar decode_norm
            // special-cases (norm byte 0 or 127 -> length exactly 1.0)
            // by recomputing those lanes with the scalar formula; AVX2
            // has no cheap masked-scatter for this on its own.
            let mut scores_arr = [0f32; 8];
            _mm256_storeu_ps(scores_arr.as_mut_ptr(), scores);
            for j in 0..8 {
                let norm_byte = norms[i + j];
                if norm_byte == 0 || norm_byte == 127 {
                    scores_arr[j] = self.score(freqs[i + j], norm_byte);
                }
            }
            scores = _mm256_loadu_ps(scores_arr.as_ptr());
            _mm256_storeu_ps(out.as_mut_ptr().add(i), scores);

            i += 8;
        }
        // Remainder (fewer than 8 left): scalar, same formula.
        while i < n {
            out[i] = self.score(freqs[i], norms[i]);
            i += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_idf_nonnegative_and_monotonic_in_rarity() {
        let rare = idf(1, 1000);
        let common = idf(900, 1000);
        assert!(rare > common);
        assert!(common >= 0.0);
    }

    #[test]
    fn test_score_increases_with_frequency() {
        let sim = Bm25Similarity::default();
        let term_stats = TermStatistics::new(10, 20);
        let collection_stats = CollectionStatistics::new(1000, 50_000);
        let weight = sim.sim_weight("body", &term_stats, &collection_stats, 1.0);
        let norm = crate::core::index::norms::encode_norm(50);
        let low = weight.score(1, norm);
        let high = weight.score(5, norm);
        assert!(high > low);
    }

    #[test]
    fn test_score_decreases_with_length() {
        let sim = Bm25Similarity::default();
        let term_stats = TermStatistics::new(10, 20);
        let collection_stats = CollectionStatistics::new(1000, 50_000);
        let weight = sim.sim_weight("body", &term_stats, &collection_stats, 1.0);
        let short = weight.score(3, crate::core::index::norms::encode_norm(10));
        let long = weight.score(3, crate::core::index::norms::encode_norm(500));
        assert!(short > long);
    }

    #[test]
    fn test_batch_matches_scalar() {
        let sim = Bm25Similarity::default();
        let term_stats = TermStatistics::new(10, 20);
        let collection_stats = CollectionStatistics::new(1000, 50_000);
        let weight = sim.sim_weight("body", &term_stats, &collection_stats, 1.0);
        let freqs: Vec<i32> = (1..=20).collect();
        let norms: Vec<u8> = (1..=20).map(|l| crate::core::index::norms::encode_norm(l * 10)).collect();
        let mut out = vec![0f32; freqs.len()];
        weight.score_batch(&freqs, &norms, &mut out);
        for i in 0..freqs.len() {
            let expected = weight.score(freqs[i], norms[i]);
            assert!((out[i] - expected).abs() < 1e-3, "lane {} mismatch", i);
        }
    }

    #[test]
    fn test_uniform_norm_batch_matches_per_doc_scalar() {
        let sim = Bm25Similarity::default();
        let term_stats = TermStatistics::new(10, 20);
        let collection_stats = CollectionStatistics::new(1000, 50_000);
        let weight = sim.sim_weight("body", &term_stats, &collection_stats, 1.0);
        let norm = crate::core::index::norms::encode_norm(80);
        let freqs: Vec<i32> = (1..=20).collect();
        let mut out = vec![0f32; freqs.len()];
        weight.score_batch_uniform_norm(norm, &freqs, &mut out);
        for i in 0..freqs.len() {
            let expected = weight.score(freqs[i], norm);
            assert!((out[i] - expected).abs() < 1e-3, "lane {} mismatch", i);
        }
    }

    #[test]
    fn test_empty_collection_falls_back_to_default_avg_length() {
        let stats = CollectionStatistics::new(0, 0);
        assert_eq!(stats.avg_field_length("body"), 50.0);
    }
}
