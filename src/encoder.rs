//! Block level Huffman encoding.
//!
//! Literals and matches are tallied into per-block buffers. When the block is flushed the
//! literal/length, distance and bit length codes are built, the cost of a dynamic, static and
//! stored block is computed, and the cheapest representation is written.

use log::{debug, trace};

use crate::bits::BitSink;
use crate::error::{Error, Result};
use crate::huffman::CodeTable;
use crate::lencoder::{calc_freqs, write_tree};
use crate::tables::*;
use crate::tally::{Tally, TallyBuffer};

/// Default number of symbols tallied before a block must be flushed.
pub const DEFAULT_TALLY_CAPACITY : usize = 1 << ( 8 + 6 );

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BlockType
{
  Stored,
  Static,
  Dynamic,
}

/// Estimated size of each block representation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BlockCosts
{
  pub dynamic_bits: usize,
  pub static_bits: usize,
  /// Stored size in bytes ( payload + length fields ), None if no raw data was supplied or it is too long.
  pub stored_bytes: Option<usize>,
}

impl BlockCosts
{
  /// Stored wins only if strictly smaller. Otherwise static unless dynamic is strictly smaller.
  pub fn choose( &self ) -> BlockType
  {
    let best = std::cmp::min( self.dynamic_bits, self.static_bits );
    match self.stored_bytes
    {
      Some( n ) if n < best >> 3 => BlockType::Stored,
      _ if self.dynamic_bits >= self.static_bits => BlockType::Static,
      _ => BlockType::Dynamic,
    }
  }
}

/// What flush_block wrote.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BlockSummary
{
  pub block_type: BlockType,
  pub costs: BlockCosts,
}

/// Huffman encoder for a sequence of RFC 1951 blocks.
///
/// Not shareable between threads while a block is in progress; separate encoders are independent.
pub struct HuffmanEncoder
{
  lit: CodeTable,
  dist: CodeTable,
  bl: CodeTable,
  tally: TallyBuffer,
  extra_bits: usize, // Extra bits used by the tallied matches.
}

impl HuffmanEncoder
{
  pub fn new( tally_capacity: usize ) -> Result<HuffmanEncoder>
  {
    Ok( HuffmanEncoder
    {
      lit: CodeTable::new( LIT_SYMBOLS, 257, 15 ),
      dist: CodeTable::new( DIST_SYMBOLS, 1, 15 ),
      bl: CodeTable::new( BL_SYMBOLS, 4, 7 ),
      tally: TallyBuffer::new( tally_capacity )?,
      extra_bits: 0,
    } )
  }

  /// Return to block start state.
  pub fn reset( &mut self )
  {
    self.tally.clear();
    self.extra_bits = 0;
    self.lit.reset();
    self.dist.reset();
    self.bl.reset();
  }

  /// Whether the block must be flushed before more symbols are tallied.
  pub fn is_full( &self ) -> bool
  {
    self.tally.is_full()
  }

  /// Number of symbols tallied in the current block.
  pub fn pending( &self ) -> usize
  {
    self.tally.len()
  }

  /// Frequencies of the literal/length alphabet for the current block.
  pub fn literal_freqs( &self ) -> &[u32]
  {
    &self.lit.freqs
  }

  /// Frequencies of the distance alphabet for the current block.
  pub fn distance_freqs( &self ) -> &[u32]
  {
    &self.dist.freqs
  }

  /// Add a literal. Returns true if the buffer is now full.
  pub fn tally_literal( &mut self, b: u8 ) -> bool
  {
    self.tally.push( Tally::Literal( b ) );
    self.lit.freqs[ b as usize ] += 1;
    self.is_full()
  }

  /// Add a match. Returns true if the buffer is now full.
  pub fn tally_match( &mut self, distance: usize, length: usize ) -> Result<bool>
  {
    if length < MIN_MATCH || length > MAX_MATCH || distance < 1 || distance > MAX_DISTANCE
    {
      return Err( Error::ProtocolRange { length, distance } );
    }
    self.tally.push( Tally::Match { length, distance } );

    let mc = length_code( length );
    self.lit.freqs[ 257 + mc ] += 1;
    self.extra_bits += MATCH_EXTRA[ mc ] as usize;

    let dc = distance_code( distance );
    self.dist.freqs[ dc ] += 1;
    self.extra_bits += DIST_EXTRA[ dc ] as usize;

    Ok( self.is_full() )
  }

  /// Write the tallied symbols as one block, choosing the smallest of stored, static and dynamic.
  ///
  /// raw is the input covered by the tallies, needed for a stored block. On error nothing is written
  /// and the tallied block is discarded.
  pub fn flush_block<S: BitSink>( &mut self, raw: Option<&[u8]>, last: bool, output: &mut S ) -> Result<BlockSummary>
  {
    let bl_codes = match self.build_trees()
    {
      Ok( n ) => n,
      Err( e ) =>
      {
        self.reset();
        return Err( e );
      }
    };

    let costs = self.costs( raw, bl_codes );
    let block_type = costs.choose();
    debug!( "block: {} symbols, dynamic={} static={} stored={:?} bytes, writing {:?}",
      self.tally.len(), costs.dynamic_bits, costs.static_bits, costs.stored_bytes, block_type );

    match ( block_type, raw )
    {
      ( BlockType::Stored, Some( raw ) ) => self.flush_stored_block( raw, last, output ),
      ( BlockType::Static, _ ) =>
      {
        output.write_bits( 3, STATIC_TREES << 1 | last as u64 );
        self.lit.set_static_codes( &STATIC_LIT_CODES, &STATIC_LIT_LENGTHS );
        self.dist.set_static_codes( &STATIC_DIST_CODES, &STATIC_DIST_LENGTHS );
        self.compress_block( output );
        self.reset();
      }
      _ =>
      {
        output.write_bits( 3, DYN_TREES << 1 | last as u64 );
        self.send_all_trees( bl_codes, output );
        self.compress_block( output );
        self.reset();
      }
    }
    Ok( BlockSummary { block_type, costs } )
  }

  /// Write raw as a stored ( uncompressed ) block and discard the tallies. raw must be at most 65535 bytes.
  pub fn flush_stored_block<S: BitSink>( &mut self, raw: &[u8], last: bool, output: &mut S )
  {
    debug_assert!( raw.len() <= MAX_STORED );
    output.write_bits( 3, STORED_BLOCK << 1 | last as u64 );
    output.align_to_byte();
    output.write_short( raw.len() as u16 );
    output.write_short( !( raw.len() as u16 ) );
    output.write_raw_bytes( raw );
    self.reset();
  }

  /// Build the literal/length, distance and bit length trees. Returns the number of bit length codes to send.
  fn build_trees( &mut self ) -> Result<usize>
  {
    self.lit.freqs[ END_OF_BLOCK ] += 1;

    self.lit.build_tree()?;
    self.dist.build_tree()?;

    calc_freqs( &self.lit, &mut self.bl );
    calc_freqs( &self.dist, &mut self.bl );
    self.bl.build_tree()?;

    // The bit length code lengths are sent in CLEN_ORDER, trailing zeroes are dropped.
    let mut bl_codes = BL_SYMBOLS;
    while bl_codes > 4 && self.bl.lengths[ CLEN_ORDER[ bl_codes - 1 ] as usize ] == 0
    {
      bl_codes -= 1;
    }
    trace!( "num_codes lit={} dist={}, bit length codes sent={}", self.lit.num_codes, self.dist.num_codes, bl_codes );
    Ok( bl_codes )
  }

  fn costs( &self, raw: Option<&[u8]>, bl_codes: usize ) -> BlockCosts
  {
    let dynamic_bits = 14 + 3 * bl_codes + self.bl.encoded_length()
      + self.lit.encoded_length() + self.dist.encoded_length() + self.extra_bits;

    let mut static_bits = self.extra_bits;
    for ( f, l ) in self.lit.freqs.iter().zip( STATIC_LIT_LENGTHS.iter() )
    {
      static_bits += *f as usize * *l as usize;
    }
    for ( f, l ) in self.dist.freqs.iter().zip( STATIC_DIST_LENGTHS.iter() )
    {
      static_bits += *f as usize * *l as usize;
    }

    let stored_bytes = raw.filter( |r| r.len() <= MAX_STORED ).map( |r| r.len() + 4 );
    BlockCosts { dynamic_bits, static_bits, stored_bytes }
  }

  fn send_all_trees<S: BitSink>( &mut self, bl_codes: usize, output: &mut S )
  {
    self.bl.build_codes();
    self.lit.build_codes();
    self.dist.build_codes();

    output.write_bits( 5, ( self.lit.num_codes - 257 ) as u64 );
    output.write_bits( 5, ( self.dist.num_codes - 1 ) as u64 );
    output.write_bits( 4, ( bl_codes - 4 ) as u64 );
    for alp in &CLEN_ORDER[ ..bl_codes ]
    {
      output.write_bits( 3, self.bl.lengths[ *alp as usize ] as u64 );
    }

    write_tree( &self.lit, &self.bl, output );
    write_tree( &self.dist, &self.bl, output );
  }

  /// Write every tallied symbol followed by the end of block code.
  fn compress_block<S: BitSink>( &self, output: &mut S )
  {
    for t in self.tally.iter()
    {
      match t
      {
        Tally::Literal( b ) => self.lit.write_symbol( output, b as usize ),
        Tally::Match { length, distance } =>
        {
          let mc = length_code( length );
          self.lit.write_symbol( output, 257 + mc );
          output.write_bits( MATCH_EXTRA[ mc ], ( length - MATCH_OFF[ mc ] as usize ) as u64 );

          let dc = distance_code( distance );
          self.dist.write_symbol( output, dc );
          output.write_bits( DIST_EXTRA[ dc ], ( distance - DIST_OFF[ dc ] as usize ) as u64 );
        }
      }
    }
    self.lit.write_symbol( output, END_OF_BLOCK );
  }
}

#[cfg(test)]
mod tests
{
  use super::*;
  use crate::bits::BitStream;
  use flate2::read::DeflateDecoder;
  use std::io::Read;

  fn inflate( data: &[u8] ) -> Vec<u8>
  {
    let mut out = Vec::new();
    DeflateDecoder::new( data ).read_to_end( &mut out ).unwrap();
    out
  }

  fn encode_literals( data: &[u8], raw: bool ) -> ( Vec<u8>, BlockSummary )
  {
    let mut enc = HuffmanEncoder::new( DEFAULT_TALLY_CAPACITY ).unwrap();
    let mut out = BitStream::new( data.len() );
    for b in data { enc.tally_literal( *b ); }
    let summary = enc.flush_block( if raw { Some( data ) } else { None }, true, &mut out ).unwrap();
    ( out.finish(), summary )
  }

  #[test]
  fn empty_block_is_end_of_block_only()
  {
    let ( bytes, summary ) = encode_literals( &[], true );
    assert_eq!( summary.block_type, BlockType::Static );
    assert_eq!( summary.costs.static_bits, 7 );
    // 3 header bits + 7 bit end of block code.
    assert_eq!( bytes, vec![ 0x03, 0x00 ] );
    assert!( inflate( &bytes ).is_empty() );
  }

  #[test]
  fn identical_bytes_collapse_to_two_symbols()
  {
    let data = [ b'a'; 1000 ];
    let mut enc = HuffmanEncoder::new( DEFAULT_TALLY_CAPACITY ).unwrap();
    let mut out = BitStream::new( 256 );
    for b in data.iter() { enc.tally_literal( *b ); }
    let summary = enc.flush_block( Some( &data[ .. ] ), true, &mut out ).unwrap();
    assert_eq!( summary.block_type, BlockType::Dynamic );
    let bytes = out.finish();
    assert!( bytes.len() < 200 );
    assert_eq!( inflate( &bytes ), data.to_vec() );
  }

  #[test]
  fn literal_lengths_of_two_symbol_block()
  {
    let mut enc = HuffmanEncoder::new( 64 ).unwrap();
    for _ in 0..10 { enc.tally_literal( 7 ); }
    enc.lit.freqs[ END_OF_BLOCK ] += 1;
    enc.lit.build_tree().unwrap();
    let used : Vec<usize> = ( 0..LIT_SYMBOLS ).filter( |&s| enc.lit.lengths[ s ] > 0 ).collect();
    assert_eq!( used, vec![ 7, END_OF_BLOCK ] );
    assert_eq!( enc.lit.num_codes, 257 );
  }

  #[test]
  fn static_cost_matches_fixed_lengths()
  {
    let data = b"hello world";
    let ( bytes, summary ) = encode_literals( data, true );
    assert_eq!( summary.block_type, BlockType::Static );
    let expect : usize = data.iter().map( |&b| if b < 144 { 8 } else { 9 } ).sum::<usize>() + 7;
    assert_eq!( summary.costs.static_bits, expect );
    assert!( summary.costs.static_bits <= summary.costs.dynamic_bits );
    assert_eq!( bytes[ 0 ] & 7, 0b011 );
    assert_eq!( inflate( &bytes ), data.to_vec() );
  }

  #[test]
  fn incompressible_block_is_stored()
  {
    let data : Vec<u8> = ( 0..=255 ).collect();
    let ( bytes, summary ) = encode_literals( &data, true );
    assert_eq!( summary.block_type, BlockType::Stored );
    assert_eq!( summary.costs.stored_bytes, Some( 260 ) );
    assert_eq!( bytes.len(), 1 + 4 + 256 );
    assert_eq!( inflate( &bytes ), data );

    // Without the raw bytes a stored block is impossible.
    let ( bytes, summary ) = encode_literals( &data, false );
    assert_eq!( summary.block_type, BlockType::Static );
    assert_eq!( inflate( &bytes ), data );
  }

  #[test]
  fn choose_prefers_static_on_tie()
  {
    let c = BlockCosts { dynamic_bits: 100, static_bits: 100, stored_bytes: None };
    assert_eq!( c.choose(), BlockType::Static );
    let c = BlockCosts { dynamic_bits: 99, static_bits: 100, stored_bytes: Some( 12 ) };
    assert_eq!( c.choose(), BlockType::Dynamic );
    let c = BlockCosts { dynamic_bits: 99, static_bits: 100, stored_bytes: Some( 11 ) };
    assert_eq!( c.choose(), BlockType::Stored );
  }

  #[test]
  fn matches_round_trip()
  {
    // "abc" then one long match and one short, far match.
    let mut data = b"abc".to_vec();
    for i in 0..258 { data.push( data[ i ] ); }
    data.extend_from_slice( b"xyz" );
    for i in 0..5 { data.push( data[ i + 1 ] ); }

    let mut enc = HuffmanEncoder::new( DEFAULT_TALLY_CAPACITY ).unwrap();
    for b in b"abc" { enc.tally_literal( *b ); }
    enc.tally_match( 3, 258 ).unwrap();
    for b in b"xyz" { enc.tally_literal( *b ); }
    enc.tally_match( 263, 5 ).unwrap();
    assert_eq!( enc.pending(), 8 );
    assert_eq!( enc.distance_freqs()[ distance_code( 263 ) ], 1 );
    assert_eq!( enc.literal_freqs()[ 257 + length_code( 258 ) ], 1 );

    let mut out = BitStream::new( 64 );
    enc.flush_block( Some( &data[ .. ] ), true, &mut out ).unwrap();
    assert_eq!( enc.pending(), 0 );
    assert_eq!( inflate( &out.finish() ), data );
  }

  #[test]
  fn match_ranges_are_checked()
  {
    let mut enc = HuffmanEncoder::new( 16 ).unwrap();
    assert_eq!( enc.tally_match( 1, 2 ), Err( Error::ProtocolRange { length: 2, distance: 1 } ) );
    assert_eq!( enc.tally_match( 1, 259 ), Err( Error::ProtocolRange { length: 259, distance: 1 } ) );
    assert_eq!( enc.tally_match( 0, 3 ), Err( Error::ProtocolRange { length: 3, distance: 0 } ) );
    assert_eq!( enc.tally_match( 32769, 3 ), Err( Error::ProtocolRange { length: 3, distance: 32769 } ) );
    assert_eq!( enc.pending(), 0 );
    assert_eq!( enc.tally_match( 32768, 258 ), Ok( false ) );
  }

  #[test]
  fn failed_flush_returns_to_block_start()
  {
    let mut enc = HuffmanEncoder::new( 64 ).unwrap();
    // A 1 bit limit cannot code three symbols, so the length repair runs out of room.
    enc.lit = CodeTable::new( LIT_SYMBOLS, 257, 1 );
    for b in b"xyz" { enc.tally_literal( *b ); }
    enc.tally_match( 1, 3 ).unwrap();

    let mut out = BitStream::new( 8 );
    let err = enc.flush_block( None, true, &mut out ).unwrap_err();
    assert!( matches!( err, Error::InvariantViolation( _ ) ) );
    assert_eq!( out.bit_len(), 0 );
    assert_eq!( enc.pending(), 0 );
    assert!( enc.literal_freqs().iter().all( |&f| f == 0 ) );
    assert!( enc.distance_freqs().iter().all( |&f| f == 0 ) );
    assert!( enc.bl.freqs.iter().all( |&f| f == 0 ) );
    assert_eq!( enc.extra_bits, 0 );
  }

  #[test]
  fn full_signal()
  {
    let mut enc = HuffmanEncoder::new( 3 ).unwrap();
    assert!( !enc.tally_literal( 1 ) );
    assert!( !enc.tally_literal( 2 ) );
    assert!( enc.tally_literal( 3 ) );
    assert!( enc.is_full() );
    let mut out = BitStream::new( 8 );
    enc.flush_block( None, false, &mut out ).unwrap();
    assert!( !enc.is_full() );
  }

  #[test]
  fn several_blocks_in_one_stream()
  {
    let data : Vec<u8> = ( 0..3000u32 ).map( |i| ( i * i % 251 ) as u8 ).collect();
    let mut enc = HuffmanEncoder::new( 1000 ).unwrap();
    let mut out = BitStream::new( data.len() );
    let mut start = 0;
    for ( i, b ) in data.iter().enumerate()
    {
      if enc.tally_literal( *b )
      {
        enc.flush_block( Some( &data[ start..=i ] ), i + 1 == data.len(), &mut out ).unwrap();
        start = i + 1;
      }
    }
    assert_eq!( start, data.len() );
    assert_eq!( inflate( &out.finish() ), data );
  }
}
