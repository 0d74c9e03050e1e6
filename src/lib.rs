//! RFC 1951 Huffman block encoding.
//!
//! The core is [`HuffmanEncoder`]: literals and ( distance, length ) matches are tallied per block,
//! then each block is written as stored, static or dynamic Huffman, whichever is smallest.
//! Dynamic blocks use length-limited canonical Huffman codes, with the code lengths themselves
//! run-length encoded using the bit length alphabet.
//!
//! [`Compressor`] drives the encoder from an LZ77 matcher running on a second thread.
//!
//! # Example:
//! ```
//! let mut comp = deflate_huffman::Compressor::new();
//! let data = b"to be or not to be, that is the question";
//! let cb : Vec<u8> = comp.deflate( data ).unwrap();
//! println!( "compressed size={}", cb.len() );
//! ```
//!
//! Driving the encoder directly:
//! ```
//! use deflate_huffman::{BitStream, HuffmanEncoder, BlockType};
//!
//! let mut enc = HuffmanEncoder::new( 1 << 14 ).unwrap();
//! let mut out = BitStream::new( 16 );
//! for b in b"abcabcabc".iter().take( 3 ) { enc.tally_literal( *b ); }
//! enc.tally_match( 3, 6 ).unwrap();
//! let summary = enc.flush_block( Some( &b"abcabcabc"[ .. ] ), true, &mut out ).unwrap();
//! assert_eq!( summary.block_type, BlockType::Static );
//! let bytes = out.finish();
//! ```

use crossbeam::channel::{self, Receiver};
use log::debug;

pub mod bits;
pub mod encoder;
pub mod error;
pub mod huffman;
pub mod lencoder;
pub mod matcher;
pub mod tables;
pub mod tally;

pub use bits::{BitSink, BitStream};
pub use encoder::{BlockCosts, BlockSummary, BlockType, HuffmanEncoder, DEFAULT_TALLY_CAPACITY};
pub use error::{Error, Result};
pub use huffman::CodeTable;
pub use matcher::Match;

use matcher::find_matches;
use tables::{MAX_MATCH, MAX_STORED};

/// Compression options.
#[derive(Clone, Debug)]
pub struct Options
{
  /// Raw input bytes per block before a flush is forced.
  pub block_size: usize,
  /// Symbols tallied per block before a flush is forced.
  pub tally_capacity: usize,
  /// Run the LZ77 matcher. If false every byte is coded as a literal.
  pub matching: bool,
  pub probe_max: usize,
  pub lazy_match: bool,
  pub match_channel_size: usize
}

impl Default for Options
{
  fn default() -> Self
  {
    Options
    {
      block_size: 0x4000,
      tally_capacity: DEFAULT_TALLY_CAPACITY,
      matching: true,
      probe_max: 10,
      lazy_match: true,
      match_channel_size: 1000
    }
  }
}

impl Options
{
  /// Check option values. A block must fit a stored block even when it ends with a maximal match.
  pub fn validate( &self ) -> Result<()>
  {
    if self.block_size == 0 || self.block_size > MAX_STORED - MAX_MATCH
    {
      return Err( Error::InvalidOption { name: "block_size", value: self.block_size } );
    }
    if self.tally_capacity == 0
    {
      return Err( Error::InvalidOption { name: "tally_capacity", value: self.tally_capacity } );
    }
    if self.matching && self.probe_max == 0
    {
      return Err( Error::InvalidOption { name: "probe_max", value: self.probe_max } );
    }
    if self.match_channel_size == 0
    {
      return Err( Error::InvalidOption { name: "match_channel_size", value: self.match_channel_size } );
    }
    Ok( () )
  }
}

/// Holds compression options and scoped thread pool.
pub struct Compressor
{
  pub options: Options,
  pub pool: scoped_threadpool::Pool
}

impl Compressor
{
  pub fn new() -> Compressor
  {
    Compressor::with_options( Options::default() )
  }

  pub fn with_options( options: Options ) -> Compressor
  {
    Compressor
    {
      options,
      pool: scoped_threadpool::Pool::new( 1 )
    }
  }

  /// RFC 1951 compression, raw deflate stream with no container framing.
  pub fn deflate( &mut self, inp: &[u8] ) -> Result<Vec<u8>>
  {
    let opt = &self.options;
    opt.validate()?;
    let mut encoder = HuffmanEncoder::new( opt.tally_capacity )?;
    let mut out = BitStream::new( inp.len() / 2 + 16 );
    let ( mtx, mrx ) = channel::bounded( opt.match_channel_size ); // channel for matches

    // Match finding runs on the pool thread while this thread writes blocks.
    let mut result = Ok( () );
    self.pool.scoped( |s|
    {
      if opt.matching
      {
        s.execute( move || { find_matches( inp, mtx, opt ); } );
      } else {
        drop( mtx );
      }
      result = write_blocks( inp, mrx, &mut encoder, &mut out, opt );
    } );
    result?;

    Ok( out.finish() )
  }
}

impl Default for Compressor
{
  fn default() -> Self
  {
    Self::new()
  }
}

/// Tally input in position order, flushing a block whenever the encoder is full, block_size
/// bytes have been tallied, or the input ends.
fn write_blocks( inp: &[u8], mrx: Receiver<Match>, encoder: &mut HuffmanEncoder, out: &mut BitStream, opt: &Options ) -> Result<()>
{
  let len = inp.len();
  if len == 0
  {
    encoder.flush_block( Some( inp ), true, out )?;
    return Ok( () );
  }

  let mut next_match = mrx.recv().ok();
  let mut block_start = 0;
  let mut position = 0;
  let mut blocks = 0;
  while position < len
  {
    let full = match next_match
    {
      Some( m ) if m.position == position =>
      {
        position += m.length;
        next_match = mrx.recv().ok();
        encoder.tally_match( m.distance, m.length )?
      }
      _ =>
      {
        position += 1;
        encoder.tally_literal( inp[ position - 1 ] )
      }
    };

    let last = position == len;
    if full || last || position - block_start >= opt.block_size
    {
      encoder.flush_block( Some( &inp[ block_start..position ] ), last, out )?;
      block_start = position;
      blocks += 1;
    }
  }
  debug!( "deflate: {} bytes in {} blocks, {} bytes out", len, blocks, out.bit_len() / 8 );
  Ok( () )
}
