//! CutPlanner — the heart of the system. Turns an OnsetList into a
//! beat-synchronous cut plan, hook span, and per-segment shot assignment.

use rand::Rng;
use rand_chacha::ChaCha8Rng;

pub struct CutPlannerConfig {
    pub fps: u32,
    pub fallback_interval_s: f64,
}

pub struct CutPlan {
    /// Cut times, strictly increasing, `C[0] == 0.0`, `C[last] == target_s`.
    pub cuts: Vec<f64>,
    /// Shot index into the clip list for each of `cuts.len() - 1` segments.
    pub shots: Vec<usize>,
    pub hook_end_s: f64,
}

pub struct CutPlanner {
    config: CutPlannerConfig,
}

impl CutPlanner {
    pub fn new(config: CutPlannerConfig) -> Self {
        Self { config }
    }

    pub fn plan(
        &self,
        onsets: &[f64],
        target_s: f64,
        audio_duration_s: f64,
        clip_count: usize,
        rng: &mut ChaCha8Rng,
    ) -> CutPlan {
        let fps = self.config.fps as f64;
        let hook_end = self.select_hook(onsets, target_s, audio_duration_s, rng);
        let base = self.base_timeline(onsets, hook_end, target_s, fps);
        let cuts = self.refine(&base, target_s, fps, rng);
        let shots = self.assign_shots(cuts.len().saturating_sub(1), clip_count, rng);

        CutPlan {
            cuts,
            shots,
            hook_end_s: hook_end,
        }
    }

    /// §4.7.1 — select the hook span `(0, h_end)`.
    fn select_hook(
        &self,
        onsets: &[f64],
        target_s: f64,
        audio_duration_s: f64,
        rng: &mut ChaCha8Rng,
    ) -> f64 {
        let t_max = onsets
            .iter()
            .copied()
            .fold(audio_duration_s, f64::max);

        let mut candidates: Vec<f64> = onsets
            .iter()
            .copied()
            .filter(|&o| o <= 0.4 * t_max)
            .collect();
        if candidates.is_empty() {
            candidates = onsets.to_vec();
        }

        let h_start = if candidates.is_empty() {
            0.0
        } else {
            let mut best = candidates[0];
            let mut best_density = -1i64;
            for &o in &candidates {
                let density = candidates
                    .iter()
                    .filter(|&&o2| (o2 - o).abs() <= 0.125)
                    .count() as i64;
                if density > best_density || (density == best_density && o < best) {
                    best_density = density;
                    best = o;
                }
            }
            best.max(0.0)
        };

        let draw = rng.gen_range(0.6..=1.5);
        (h_start + draw).min(1.5).min(target_s)
    }

    /// §4.7.2 — build the preliminary cut candidate sequence `P`.
    fn base_timeline(&self, onsets: &[f64], hook_end: f64, target_s: f64, fps: f64) -> Vec<f64> {
        let gap = 1.0 / fps;
        let mut b: Vec<f64> = onsets
            .iter()
            .copied()
            .filter(|&o| o > hook_end + gap)
            .collect();

        if b.len() < 4 {
            b = fallback_sequence(hook_end, target_s, self.config.fallback_interval_s);
        }

        let mut p: Vec<f64> = vec![0.0, hook_end];
        p.extend(b.into_iter().filter(|&t| t <= target_s));
        p.push(target_s);

        for v in p.iter_mut() {
            *v = (*v * 1e6).round() / 1e6;
        }
        p.sort_by(|a, b| a.partial_cmp(b).unwrap());
        p.dedup();
        p
    }

    /// §4.7.3 — length-biased refinement of `P` into the final CutPlan.
    fn refine(&self, p: &[f64], target_s: f64, fps: f64, rng: &mut ChaCha8Rng) -> Vec<f64> {
        if p.is_empty() {
            return vec![0.0, target_s];
        }
        let min_gap = 2.0 / fps;
        let mut r = vec![p[0]];
        let mut next_idx = 1usize;

        while next_idx < p.len() {
            let frames = draw_length_frames(rng);
            let w = frames as f64 / fps;
            let last = *r.last().unwrap();
            let desired = last + w;

            let remaining = &p[next_idx..];
            let (nb_pos, nb_val) = remaining
                .iter()
                .enumerate()
                .min_by(|(_, a), (_, b)| {
                    (*a - desired).abs().partial_cmp(&(*b - desired).abs()).unwrap()
                })
                .map(|(i, v)| (next_idx + i, *v))
                .unwrap();

            if nb_val <= last + min_gap {
                let skip_to = p[next_idx..]
                    .iter()
                    .position(|&v| v > last + min_gap)
                    .map(|i| next_idx + i);
                match skip_to {
                    Some(j) => {
                        r.push(p[j]);
                        next_idx = j + 1;
                    }
                    None => break,
                }
            } else {
                r.push(nb_val);
                next_idx = nb_pos + 1;
            }
        }

        let last = *r.last().unwrap();
        if target_s - last > 1e-3 {
            if r.len() > 1 && target_s - last < min_gap {
                // Appending `target_s` here would violate the minimum gap; fold
                // the trailing cut into the target boundary instead of keeping both.
                *r.last_mut().unwrap() = target_s;
            } else {
                r.push(target_s);
            }
        }
        r
    }

    /// §4.7.4 — assign a source clip index to each segment, forbidding
    /// immediate repetition.
    fn assign_shots(&self, segment_count: usize, clip_count: usize, rng: &mut ChaCha8Rng) -> Vec<usize> {
        let mut shots = Vec::with_capacity(segment_count);
        let mut last: Option<usize> = None;
        for _ in 0..segment_count {
            let chosen = if clip_count <= 1 {
                0
            } else {
                loop {
                    let candidate = rng.gen_range(0..clip_count);
                    if Some(candidate) != last {
                        break candidate;
                    }
                }
            };
            shots.push(chosen);
            last = Some(chosen);
        }
        shots
    }
}

/// The uniform fallback sequence used both directly by `OnsetDetector`'s
/// documented contract and internally by `base_timeline` when too few
/// onsets survive past the hook.
pub fn fallback_sequence(hook_end_s: f64, target_s: f64, interval_s: f64) -> Vec<f64> {
    let mut out = Vec::new();
    let mut k = 1u32;
    loop {
        let t = hook_end_s + k as f64 * interval_s;
        if t >= target_s {
            break;
        }
        out.push(t);
        k += 1;
    }
    out
}

fn draw_length_frames(rng: &mut ChaCha8Rng) -> u32 {
    let roll: f64 = rng.gen_range(0.0..1.0);
    if roll < 0.45 {
        rng.gen_range(4..=7)
    } else if roll < 0.85 {
        rng.gen_range(8..=16)
    } else {
        rng.gen_range(17..=28)
    }
}
