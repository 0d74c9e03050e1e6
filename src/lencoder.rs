//! RFC 1951 encoding of code lengths ( page 13 ).
//!
//! The lengths of the literal/length and distance codes are sent using the 19 symbol bit length
//! alphabet, where 16, 17 and 18 are repeat codes. The same segmentation is used to count the
//! bit length frequencies and, once the bit length code is built, to write the lengths.

use crate::bits::BitSink;
use crate::huffman::CodeTable;
use crate::tables::{REPEAT_3_6, REPEAT_ZERO_11_138, REPEAT_ZERO_3_10};

/// One bit length alphabet symbol with its extra bits.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MetaSymbol
{
  pub symbol: usize,
  pub extra_bits: u8,
  pub extra: u8,
}

impl MetaSymbol
{
  fn length( len: u8 ) -> MetaSymbol
  {
    MetaSymbol { symbol: len as usize, extra_bits: 0, extra: 0 }
  }

  fn repeat( symbol: usize, extra_bits: u8, extra: usize ) -> MetaSymbol
  {
    MetaSymbol { symbol, extra_bits, extra: extra as u8 }
  }
}

/// Run length encode a list of code lengths.
pub fn run_lengths( lengths: &[u8] ) -> Vec<MetaSymbol>
{
  let mut out = Vec::with_capacity( lengths.len() );
  let mut current : Option<u8> = None; // Length of the previous run.
  let mut i = 0;
  while i < lengths.len()
  {
    let next = lengths[ i ];
    let mut count = 1;
    let max_count = if next == 0 { 138 } else { 6 };
    if next != 0 && current != Some( next )
    {
      // A new non-zero length is sent once, then repeated.
      out.push( MetaSymbol::length( next ) );
      count = 0;
    }
    current = Some( next );
    i += 1;

    while i < lengths.len() && lengths[ i ] == next
    {
      i += 1;
      count += 1;
      if count >= max_count { break }
    }

    if count < 3
    {
      for _ in 0..count { out.push( MetaSymbol::length( next ) ); }
    }
    else if next != 0
    {
      out.push( MetaSymbol::repeat( REPEAT_3_6, 2, count - 3 ) );
    }
    else if count <= 10
    {
      out.push( MetaSymbol::repeat( REPEAT_ZERO_3_10, 3, count - 3 ) );
    } else {
      out.push( MetaSymbol::repeat( REPEAT_ZERO_11_138, 7, count - 11 ) );
    }
  }
  out
}

/// Count the bit length symbols needed to send the lengths of table.
pub fn calc_freqs( table: &CodeTable, bl: &mut CodeTable )
{
  for ms in run_lengths( &table.lengths[ ..table.num_codes ] )
  {
    bl.freqs[ ms.symbol ] += 1;
  }
}

/// Write the lengths of table using the bit length code bl.
pub fn write_tree<S: BitSink>( table: &CodeTable, bl: &CodeTable, output: &mut S )
{
  for ms in run_lengths( &table.lengths[ ..table.num_codes ] )
  {
    bl.write_symbol( output, ms.symbol );
    output.write_bits( ms.extra_bits, ms.extra as u64 );
  }
}

#[cfg(test)]
mod tests
{
  use super::*;
  use crate::bits::BitStream;
  use rand::{rngs::StdRng, Rng, SeedableRng};

  // Reference decoder for the repeat codes.
  fn replay( symbols: &[MetaSymbol] ) -> Vec<u8>
  {
    let mut out : Vec<u8> = Vec::new();
    for ms in symbols
    {
      match ms.symbol
      {
        0..=15 => out.push( ms.symbol as u8 ),
        16 =>
        {
          assert_eq!( ms.extra_bits, 2 );
          let prev = *out.last().unwrap();
          for _ in 0..3 + ms.extra { out.push( prev ); }
        }
        17 => { assert_eq!( ms.extra_bits, 3 ); for _ in 0..3 + ms.extra { out.push( 0 ); } }
        18 => { assert_eq!( ms.extra_bits, 7 ); for _ in 0..11 + ms.extra as usize { out.push( 0 ); } }
        _ => panic!( "bad symbol {}", ms.symbol ),
      }
      assert!( ( ms.extra as u32 ) < 1u32 << ms.extra_bits );
    }
    out
  }

  // Reads bits least significant first, as an inflater does.
  struct BitReader<'a>
  {
    bytes: &'a [u8],
    position: usize,
  }

  impl<'a> BitReader<'a>
  {
    fn bits( &mut self, n: u8 ) -> u8
    {
      let mut v = 0;
      for i in 0..n
      {
        let bit = ( self.bytes[ self.position / 8 ] >> ( self.position % 8 ) ) & 1;
        v |= bit << i;
        self.position += 1;
      }
      v
    }

    // Codes are stored reversed, so the first bit read is the low bit of the stored code.
    fn symbol( &mut self, bl: &CodeTable ) -> usize
    {
      let mut code : u16 = 0;
      for len in 1..=7u8
      {
        code |= ( self.bits( 1 ) as u16 ) << ( len - 1 );
        if let Some( sym ) = ( 0..bl.symbols() ).find( |&s| bl.lengths[ s ] == len && bl.codes[ s ] == code )
        {
          return sym;
        }
      }
      panic!( "no bit length code matches {:b}", code );
    }
  }

  #[test]
  fn written_tree_decodes_to_lengths()
  {
    let mut rng = StdRng::seed_from_u64( 29 );
    for _ in 0..50
    {
      let mut lit = CodeTable::new( 286, 257, 15 );
      let used = rng.gen_range( 1..286 );
      for f in lit.freqs.iter_mut().take( used )
      {
        *f = if rng.gen_bool( 0.3 ) { 0 } else { rng.gen_range( 1..1000 ) };
      }
      lit.build_tree().unwrap();

      let mut bl = CodeTable::new( 19, 4, 7 );
      calc_freqs( &lit, &mut bl );
      bl.build_tree().unwrap();
      bl.build_codes();

      let mut out = BitStream::new( 256 );
      write_tree( &lit, &bl, &mut out );
      let written = out.bit_len();
      let bytes = out.finish();

      let mut reader = BitReader { bytes: &bytes, position: 0 };
      let mut lengths : Vec<u8> = Vec::new();
      while lengths.len() < lit.num_codes
      {
        let sym = reader.symbol( &bl );
        let ( repeat, value ) = match sym
        {
          0..=15 => ( 1, sym as u8 ),
          16 => ( 3 + reader.bits( 2 ) as usize, *lengths.last().unwrap() ),
          17 => ( 3 + reader.bits( 3 ) as usize, 0 ),
          _ => ( 11 + reader.bits( 7 ) as usize, 0 ),
        };
        for _ in 0..repeat { lengths.push( value ); }
      }
      assert_eq!( &lengths[ .. ], &lit.lengths[ ..lit.num_codes ] );
      assert_eq!( reader.position, written );
    }
  }

  #[test]
  fn replay_reproduces_random_lengths()
  {
    let mut rng = StdRng::seed_from_u64( 13 );
    for _ in 0..500
    {
      let n = rng.gen_range( 0..320 );
      let runny = rng.gen_bool( 0.7 );
      let mut lengths = Vec::with_capacity( n );
      while lengths.len() < n
      {
        let v = if rng.gen_bool( 0.4 ) { 0 } else { rng.gen_range( 1..16 ) };
        let run = if runny { rng.gen_range( 1..160 ) } else { 1 };
        for _ in 0..run { if lengths.len() < n { lengths.push( v ); } }
      }
      assert_eq!( replay( &run_lengths( &lengths ) ), lengths );
    }
  }

  #[test]
  fn zero_run_of_139_is_split()
  {
    let ms = run_lengths( &[ 0; 139 ] );
    assert_eq!( ms, vec![ MetaSymbol::repeat( 18, 7, 127 ), MetaSymbol::length( 0 ) ] );
  }

  #[test]
  fn segmentation()
  {
    let ms = run_lengths( &[ 5, 5, 5, 5, 0, 0, 3, 3, 3, 3, 3, 3, 3, 3, 3, 3, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0 ] );
    assert_eq!( ms, vec![
      MetaSymbol::length( 5 ), MetaSymbol::repeat( 16, 2, 0 ),
      MetaSymbol::length( 0 ), MetaSymbol::length( 0 ),
      MetaSymbol::length( 3 ), MetaSymbol::repeat( 16, 2, 3 ), MetaSymbol::repeat( 16, 2, 0 ),
      MetaSymbol::repeat( 18, 7, 0 ),
    ] );
  }

  #[test]
  fn frequency_pass_counts_emitted_symbols()
  {
    let mut lit = CodeTable::new( 8, 1, 15 );
    lit.lengths.copy_from_slice( &[ 2, 2, 2, 2, 0, 0, 0, 3 ] );
    lit.num_codes = 8;
    let mut bl = CodeTable::new( 19, 4, 7 );
    calc_freqs( &lit, &mut bl );
    assert_eq!( bl.freqs[ 2 ], 1 );
    assert_eq!( bl.freqs[ 16 ], 1 );
    assert_eq!( bl.freqs[ 17 ], 1 );
    assert_eq!( bl.freqs[ 3 ], 1 );
    assert_eq!( bl.freqs.iter().sum::<u32>(), 4 );
  }
}
