//! Per-line execution of a built transform

use crate::context::MAX_CHANNELS;
use crate::pipeline::Pipeline;
use crate::simd;

use super::format::Formatter;
use super::scheduler::WorkSlice;

/// How pixels go through the pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Kernel {
    /// Formatter round trip, no color math
    Null,
    /// Floating point all the way
    Float,
    /// 16-bit evaluation, usually of a precalculated CLUT
    Precalc16,
}

/// Last pixel seen and its result
#[derive(Debug, Clone, Copy)]
pub(crate) struct Cache {
    input: [u16; MAX_CHANNELS],
    output: [u16; MAX_CHANNELS],
}

/// Everything a worker needs to run lines
#[derive(Debug, Clone)]
pub(crate) struct Executor {
    pub(crate) kernel: Kernel,
    pub(crate) pipeline: Pipeline,
    pub(crate) gamut: Option<Pipeline>,
    pub(crate) cache: Option<Cache>,
    pub(crate) alarm: [u16; MAX_CHANNELS],
    pub(crate) copy_alpha: bool,
    pub(crate) input: Formatter,
    pub(crate) output: Formatter,
}

impl Executor {
    /// Seed the cache with the result for an all-zero pixel
    pub(crate) fn seed_cache(&mut self) {
        let mut cache = Cache {
            input: [0; MAX_CHANNELS],
            output: [0; MAX_CHANNELS],
        };
        let (n_in, n_out) = (self.input.channels(), self.output.channels());
        self.eval16(&cache.input[..n_in], &mut cache.output[..n_out]);
        self.cache = Some(cache);
    }

    pub(crate) fn run_slice(&self, slice: WorkSlice<'_>) {
        let pixels = slice.pixels_per_line;
        let in_len = pixels * self.input.format().bytes_per_pixel();
        let out_len = pixels * self.output.format().bytes_per_pixel();
        let mut lines = LineBuffers::new(self.kernel, pixels, &self.input, &self.output);
        let mut cache = self.cache;

        for line in 0..slice.lines {
            let src = &slice.input[line * slice.input_stride..][..in_len];
            let dst = &mut slice.output[line * slice.output_stride..][..out_len];
            match self.kernel {
                Kernel::Null => self.run_null(src, dst, pixels, &mut lines.words),
                Kernel::Float => self.run_float(src, dst, pixels, &mut lines),
                Kernel::Precalc16 => self.run_words(src, dst, pixels, &mut lines, &mut cache),
            }
            if self.copy_alpha {
                Formatter::copy_extra(&self.input, &self.output, src, dst, pixels);
            }
        }
    }

    fn run_null(&self, src: &[u8], dst: &mut [u8], pixels: usize, words: &mut [u16]) {
        let (n_in, n_out) = (self.input.channels(), self.output.channels());
        self.input.unpack_words(src, pixels, &mut words[..pixels * n_in]);
        if n_in == n_out {
            self.output.pack_words(&words[..pixels * n_in], pixels, dst);
            return;
        }
        let mut out = vec![0u16; pixels * n_out];
        simd::map_pixels_u16(&words[..pixels * n_in], n_in, &mut out, n_out, |s, d| {
            let n = s.len().min(d.len());
            d[..n].copy_from_slice(&s[..n]);
        });
        self.output.pack_words(&out, pixels, dst);
    }

    fn run_words(
        &self,
        src: &[u8],
        dst: &mut [u8],
        pixels: usize,
        lines: &mut LineBuffers,
        cache: &mut Option<Cache>,
    ) {
        let (n_in, n_out) = (self.input.channels(), self.output.channels());
        let (win, wout) = (&mut lines.words, &mut lines.words_out);
        self.input.unpack_words(src, pixels, &mut win[..pixels * n_in]);
        simd::map_pixels_u16(&win[..pixels * n_in], n_in, &mut wout[..pixels * n_out], n_out, |s, d| {
            if let Some(hit) = cache.as_ref().filter(|c| c.input[..n_in] == *s) {
                d.copy_from_slice(&hit.output[..n_out]);
                return;
            }
            self.eval16(s, d);
            if let Some(c) = cache.as_mut() {
                c.input[..n_in].copy_from_slice(s);
                c.output[..n_out].copy_from_slice(d);
            }
        });
        self.output.pack_words(&wout[..pixels * n_out], pixels, dst);
    }

    fn eval16(&self, input: &[u16], output: &mut [u16]) {
        if let Some(gamut) = &self.gamut {
            let mut out_of_gamut = [0u16; 1];
            gamut.eval_u16(input, &mut out_of_gamut);
            if out_of_gamut[0] >= 1 {
                output.copy_from_slice(&self.alarm[..output.len()]);
                return;
            }
        }
        self.pipeline.eval_u16(input, output);
    }

    fn run_float(&self, src: &[u8], dst: &mut [u8], pixels: usize, lines: &mut LineBuffers) {
        let (n_in, n_out) = (self.input.channels(), self.output.channels());
        let (fin, fout) = (&mut lines.floats, &mut lines.floats_out);
        self.input.unpack_floats(src, pixels, &mut fin[..pixels * n_in]);
        simd::map_pixels_f32(&fin[..pixels * n_in], n_in, &mut fout[..pixels * n_out], n_out, |s, d| {
            if let Some(gamut) = &self.gamut {
                let mut out_of_gamut = [0f32; 1];
                gamut.eval_f32(s, &mut out_of_gamut);
                if out_of_gamut[0] > 0.0 {
                    for (v, &code) in d.iter_mut().zip(&self.alarm) {
                        *v = code as f32 / 65535.0;
                    }
                    return;
                }
            }
            self.pipeline.eval_f32(s, d);
        });
        self.output.pack_floats(&fout[..pixels * n_out], pixels, dst);
    }
}

/// Scratch lines reused across the lines of one slice
struct LineBuffers {
    words: Vec<u16>,
    words_out: Vec<u16>,
    floats: Vec<f32>,
    floats_out: Vec<f32>,
}

impl LineBuffers {
    fn new(kernel: Kernel, pixels: usize, input: &Formatter, output: &Formatter) -> Self {
        let (n_in, n_out) = (pixels * input.channels(), pixels * output.channels());
        match kernel {
            Kernel::Float => Self {
                words: Vec::new(),
                words_out: Vec::new(),
                floats: vec![0.0; n_in],
                floats_out: vec![0.0; n_out],
            },
            _ => Self {
                words: vec![0; n_in],
                words_out: vec![0; n_out],
                floats: Vec::new(),
                floats_out: Vec::new(),
            },
        }
    }
}
