//! Parallel execution hook for batch transforms

/// A disjoint piece of a batch: whole lines of input and output
#[derive(Debug)]
pub struct WorkSlice<'a> {
    pub input: &'a [u8],
    pub output: &'a mut [u8],
    pub pixels_per_line: usize,
    pub lines: usize,
    pub input_stride: usize,
    pub output_stride: usize,
}

/// Runs the slices of a batch, possibly on several threads
///
/// Slices never overlap and each pixel is independent, so any order of
/// execution is valid. Every slice must be handed to `worker` exactly once
/// before `run` returns.
pub trait ParallelScheduler: Send + Sync {
    /// How many slices a batch should be cut into
    fn max_workers(&self) -> usize;

    fn run(&self, slices: Vec<WorkSlice<'_>>, worker: &(dyn Fn(WorkSlice<'_>) + Sync));
}

/// Scheduler on the rayon thread pool
#[cfg(feature = "parallel")]
#[derive(Debug, Clone, Default)]
pub struct RayonScheduler {
    pool: Option<std::sync::Arc<rayon::ThreadPool>>,
}

#[cfg(feature = "parallel")]
impl RayonScheduler {
    /// Use the global rayon pool
    pub fn new() -> Self {
        Self::default()
    }

    /// Use a dedicated pool
    pub fn with_pool(pool: std::sync::Arc<rayon::ThreadPool>) -> Self {
        Self { pool: Some(pool) }
    }
}

#[cfg(feature = "parallel")]
impl ParallelScheduler for RayonScheduler {
    fn max_workers(&self) -> usize {
        match &self.pool {
            Some(pool) => pool.current_num_threads(),
            None => rayon::current_num_threads(),
        }
    }

    fn run(&self, slices: Vec<WorkSlice<'_>>, worker: &(dyn Fn(WorkSlice<'_>) + Sync)) {
        use rayon::prelude::*;

        let job = || slices.into_par_iter().for_each(worker);
        match &self.pool {
            Some(pool) => pool.install(job),
            None => job(),
        }
    }
}

/// Cut `lines` lines into at most `workers` slices of whole lines; a single
/// line is cut by pixels instead
pub(crate) fn split<'a>(
    whole: WorkSlice<'a>,
    workers: usize,
    in_bpp: usize,
    out_bpp: usize,
) -> Vec<WorkSlice<'a>> {
    let workers = workers.max(1);
    if whole.lines == 1 {
        let per = whole.pixels_per_line.div_ceil(workers).max(1);
        return whole
            .input
            .chunks(per * in_bpp)
            .zip(whole.output.chunks_mut(per * out_bpp))
            .take(whole.pixels_per_line.div_ceil(per))
            .enumerate()
            .map(|(i, (input, output))| {
                let pixels = per.min(whole.pixels_per_line - i * per);
                WorkSlice {
                    input,
                    output,
                    pixels_per_line: pixels,
                    lines: 1,
                    input_stride: pixels * in_bpp,
                    output_stride: pixels * out_bpp,
                }
            })
            .collect();
    }

    let per = whole.lines.div_ceil(workers).max(1);
    let mut slices = Vec::with_capacity(workers);
    let (mut input, mut output) = (whole.input, whole.output);
    let mut remaining = whole.lines;
    while remaining > 0 {
        let lines = per.min(remaining);
        remaining -= lines;
        let (in_len, out_len) = if remaining == 0 {
            (input.len(), output.len())
        } else {
            (lines * whole.input_stride, lines * whole.output_stride)
        };
        let (head_in, tail_in) = input.split_at(in_len);
        let (head_out, tail_out) = std::mem::take(&mut output).split_at_mut(out_len);
        slices.push(WorkSlice {
            input: head_in,
            output: head_out,
            pixels_per_line: whole.pixels_per_line,
            lines,
            input_stride: whole.input_stride,
            output_stride: whole.output_stride,
        });
        input = tail_in;
        output = tail_out;
    }
    slices
}
