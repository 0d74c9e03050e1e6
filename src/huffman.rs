//! RFC 1951 length-limited canonical Huffman coding.

use crate::bits::BitSink;
use crate::error::{Error, Result};
use crate::tables::bit_reverse;

/// Marks a leaf in the children table ( the second slot of a leaf is unused ).
const LEAF : usize = usize::MAX;

/// Frequencies, code lengths and codes for one alphabet, valid for one block.
pub struct CodeTable
{
  pub freqs: Vec<u32>,   // Number of times each symbol is used in the block ( input ).
  pub lengths: Vec<u8>,  // Number of bits used to encode each symbol, 0 = unused ( output ).
  pub codes: Vec<u16>,   // Bit-reversed code for each symbol ( output ).
  pub num_codes: usize,  // Highest used symbol + 1, at least min_codes.

  min_codes: usize,
  max_length: usize,     // Limit on code length ( 15 or 7 for RFC 1951 ).
  bl_counts: Vec<i32>,   // bl_counts[ n ] is the number of symbols encoded with n + 1 bits.
}

impl CodeTable
{
  pub fn new( symbols: usize, min_codes: usize, max_length: usize ) -> CodeTable
  {
    CodeTable
    {
      freqs: vec![ 0; symbols ],
      lengths: vec![ 0; symbols ],
      codes: vec![ 0; symbols ],
      num_codes: 0,
      min_codes,
      max_length,
      bl_counts: vec![ 0; max_length ],
    }
  }

  /// Number of symbols in the alphabet.
  pub fn symbols( &self ) -> usize
  {
    self.freqs.len()
  }

  /// Clear frequencies, lengths and codes ready for the next block.
  pub fn reset( &mut self )
  {
    self.freqs.iter_mut().for_each( |f| *f = 0 );
    self.lengths.iter_mut().for_each( |l| *l = 0 );
    self.codes.iter_mut().for_each( |c| *c = 0 );
    self.num_codes = 0;
  }

  /// Sum of freq * length, the number of bits needed for the symbols of this alphabet.
  pub fn encoded_length( &self ) -> usize
  {
    self.freqs.iter().zip( &self.lengths ).map( |( f, l )| *f as usize * *l as usize ).sum()
  }

  pub fn write_symbol<S: BitSink>( &self, output: &mut S, sym: usize )
  {
    output.write_bits( self.lengths[ sym ], self.codes[ sym ] as u64 );
  }

  /// Install a predefined code ( the RFC 1951 fixed tables ).
  pub fn set_static_codes( &mut self, codes: &[u16], lengths: &[u8] )
  {
    self.codes.copy_from_slice( codes );
    self.lengths.copy_from_slice( lengths );
  }

  /// Compute lengths from freqs.
  ///
  /// Leaves are kept in a binary heap keyed by frequency, then the two least used nodes are
  /// repeatedly combined. Ties go to the node inserted first, which keeps the output identical
  /// to other zlib-derived encoders. Lengths over max_length are repaired by build_length.
  pub fn build_tree( &mut self ) -> Result<()>
  {
    self.lengths.iter_mut().for_each( |l| *l = 0 );

    // Phase one: heap of symbol ids ordered by frequency.
    let mut leaves : Vec<usize> = Vec::with_capacity( self.symbols() );
    let mut max_code = 0;
    for sym in 0..self.symbols()
    {
      let freq = self.freqs[ sym ];
      if freq != 0
      {
        let mut pos = leaves.len();
        leaves.push( sym );
        while pos > 0
        {
          let parent = ( pos - 1 ) >> 1;
          if self.freqs[ leaves[ parent ] ] <= freq { break }
          leaves[ pos ] = leaves[ parent ];
          pos = parent;
        }
        leaves[ pos ] = sym;
        max_code = sym;
      }
    }

    // A single symbol could be coded with 0 bits, but then the decoder would never see it.
    // Force at least two leaves so every used symbol gets a 1 bit code.
    while leaves.len() < 2
    {
      if max_code < 2
      {
        max_code += 1;
        leaves.push( max_code );
      } else {
        leaves.push( 0 );
      }
    }

    self.num_codes = std::cmp::max( max_code + 1, self.min_codes );

    // Phase two: heap of node ids. Nodes 0..num_leaves are the leaves in heap order,
    // internal nodes are numbered from num_leaves in creation order, the root last.
    let num_leaves = leaves.len();
    let mut children : Vec<usize> = vec![ 0; 4 * num_leaves - 2 ];
    let mut values : Vec<u64> = vec![ 0; 2 * num_leaves - 1 ];
    let mut heap : Vec<usize> = Vec::with_capacity( num_leaves );

    for ( node, sym ) in leaves.iter().enumerate()
    {
      children[ 2 * node ] = *sym;
      children[ 2 * node + 1 ] = LEAF;
      // Node value is frequency in the high bits, depth in the low 8 bits.
      values[ node ] = ( self.freqs[ *sym ] as u64 ) << 8;
      heap.push( node );
    }

    let mut heap_len = num_leaves;
    let mut num_nodes = num_leaves;
    loop // Keep pairing the two least used nodes.
    {
      let first = heap[ 0 ];
      heap_len -= 1;
      let last = heap[ heap_len ];
      let pos = sift_hole( &mut heap, &values, heap_len );
      sift_up( &mut heap, &values, pos, last );

      let second = heap[ 0 ];
      let node = num_nodes;
      num_nodes += 1;
      children[ 2 * node ] = first;
      children[ 2 * node + 1 ] = second;

      // Sum of frequencies, depth is one more than the deeper child.
      let min_depth = std::cmp::min( values[ first ] & 0xff, values[ second ] & 0xff );
      values[ node ] = values[ first ] + values[ second ] - min_depth + 1;

      // The new node replaces second at the top.
      let pos = sift_hole( &mut heap, &values, heap_len );
      sift_up( &mut heap, &values, pos, node );

      if heap_len <= 1 { break }
    }

    if heap[ 0 ] != children.len() / 2 - 1
    {
      return Err( Error::InvariantViolation( "heap root is not the last tree node" ) );
    }

    self.build_length( &children )
  }

  /// Walk the tree from the root assigning lengths, then repair any that exceed max_length.
  fn build_length( &mut self, children: &[usize] ) -> Result<()>
  {
    let max_len = self.max_length;
    let num_nodes = children.len() / 2;
    let num_leaves = ( num_nodes + 1 ) / 2;
    let mut overflow : i32 = 0;

    self.bl_counts.iter_mut().for_each( |c| *c = 0 );

    let mut depth : Vec<usize> = vec![ 0; num_nodes ];
    for node in ( 0..num_nodes ).rev()
    {
      if children[ 2 * node + 1 ] != LEAF
      {
        let mut bits = depth[ node ] + 1;
        if bits > max_len
        {
          bits = max_len;
          overflow += 1;
        }
        depth[ children[ 2 * node ] ] = bits;
        depth[ children[ 2 * node + 1 ] ] = bits;
      } else {
        let bits = depth[ node ];
        self.bl_counts[ bits - 1 ] += 1;
        self.lengths[ children[ 2 * node ] ] = bits as u8;
      }
    }

    if overflow == 0 { return Ok( () ); }

    log::trace!( "length limit {} exceeded, overflow {}", max_len, overflow );

    let mut incr = max_len - 1;
    loop
    {
      // Find the first bit length which could increase.
      loop
      {
        incr = incr.checked_sub( 1 ).ok_or( Error::InvariantViolation( "no bit length left to lengthen" ) )?;
        if self.bl_counts[ incr ] != 0 { break }
      }

      // Move this node one down and remove a corresponding number of overflow nodes.
      loop
      {
        self.bl_counts[ incr ] -= 1;
        incr += 1;
        self.bl_counts[ incr ] += 1;
        overflow -= 1 << ( max_len - 1 - incr );
        if overflow <= 0 || incr >= max_len - 1 { break }
      }
      if overflow <= 0 { break }
    }

    // May have overshot above, move nodes back from max_len to max_len - 1.
    self.bl_counts[ max_len - 1 ] += overflow;
    self.bl_counts[ max_len - 2 ] -= overflow;

    // Recompute all leaf lengths. Internal nodes were created in increasing weight order,
    // so reading their children from the first internal node visits the least used leaves first.
    let mut index = 2 * num_leaves;
    for bits in ( 1..=max_len ).rev()
    {
      let mut n = self.bl_counts[ bits - 1 ];
      while n > 0
      {
        let child = 2 * *children.get( index ).ok_or( Error::InvariantViolation( "tree walk overran node table" ) )?;
        index += 1;
        if children[ child + 1 ] == LEAF
        {
          self.lengths[ children[ child ] ] = bits as u8;
          n -= 1;
        }
      }
    }
    Ok( () )
  }

  /// Compute canonical codes from lengths ( RFC 1951 section 3.2.2 ).
  ///
  /// Codes are built MSB first, left aligned in 16 bits, then reversed for LSB-first output.
  pub fn build_codes( &mut self )
  {
    let mut next_code : Vec<u32> = vec![ 0; self.max_length ];
    let mut code : u32 = 0;
    for bits in 0..self.max_length
    {
      next_code[ bits ] = code;
      code += ( self.bl_counts[ bits ] as u32 ) << ( 15 - bits );
    }

    for sym in 0..self.num_codes
    {
      let bits = self.lengths[ sym ] as usize;
      if bits > 0
      {
        self.codes[ sym ] = bit_reverse( next_code[ bits - 1 ] as u16 );
        next_code[ bits - 1 ] += 1 << ( 16 - bits );
      }
    }
  }
}

/// Move the hole at the top of the heap down to a leaf, always promoting the smaller child.
/// Returns the position of the hole.
fn sift_hole( heap: &mut [usize], values: &[u64], heap_len: usize ) -> usize
{
  let mut hole = 0;
  let mut path = 1;
  while path < heap_len
  {
    if path + 1 < heap_len && values[ heap[ path ] ] > values[ heap[ path + 1 ] ] { path += 1; }
    heap[ hole ] = heap[ path ];
    hole = path;
    path = path * 2 + 1;
  }
  hole
}

/// Place node at pos, moving it up while its parent is larger.
fn sift_up( heap: &mut [usize], values: &[u64], mut pos: usize, node: usize )
{
  let value = values[ node ];
  while pos > 0
  {
    let parent = ( pos - 1 ) >> 1;
    if values[ heap[ parent ] ] <= value { break }
    heap[ pos ] = heap[ parent ];
    pos = parent;
  }
  heap[ pos ] = node;
}
